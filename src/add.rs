//! Diagrams with arbitrary leaves.
//!
//! An [`Add`] is kept as a *leaf partition*: a list of `(value, guard)`
//! pairs whose BDD guards are pairwise disjoint, non-empty and cover the
//! whole space, with every value occurring once. This is the shape the
//! encoder needs for expression evaluation: arithmetic and comparisons act
//! on the leaves, while the guards carry the boolean structure.

use std::fmt;
use std::rc::Rc;

use crate::bdd::Bdd;
use crate::reference::Ref;

/// A leaf value.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Sym(Rc<str>),
    /// Sorted, duplicate-free, never a singleton.
    Set(Rc<[Value]>),
}

impl Value {
    pub fn sym(name: &str) -> Self {
        Value::Sym(Rc::from(name))
    }

    /// Build a set value; a single element collapses to itself.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        let mut elems = Vec::new();
        for item in items {
            match item {
                Value::Set(inner) => elems.extend(inner.iter().cloned()),
                other => elems.push(other),
            }
        }
        elems.sort();
        elems.dedup();
        if elems.len() == 1 {
            elems.swap_remove(0)
        } else {
            Value::Set(Rc::from(elems))
        }
    }

    /// The scalar values this leaf stands for.
    pub fn elements(&self) -> Vec<Value> {
        match self {
            Value::Set(items) => items.to_vec(),
            other => vec![other.clone()],
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Value::Int(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(true) => write!(f, "TRUE"),
            Value::Bool(false) => write!(f, "FALSE"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Sym(s) => write!(f, "{}", s),
            Value::Set(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Failure of a leaf operation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum LeafError {
    DivisionByZero,
    TypeMismatch(String),
}

/// Binary operations on leaves.
///
/// Derived operators are obtained by negating an operand or the result:
/// `!=` is [`LeafOp::Eq`] negated, `>=` is [`LeafOp::Lt`] negated, and so on.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum LeafOp {
    And,
    Or,
    Xor,
    Eq,
    Lt,
    Le,
    Plus,
    Minus,
    Times,
    Divide,
    Mod,
    Union,
    SetIn,
}

fn type_mismatch(op: LeafOp, a: &Value, b: &Value) -> LeafError {
    LeafError::TypeMismatch(format!("{:?} applied to {} and {}", op, a, b))
}

impl LeafOp {
    pub fn apply(self, a: &Value, b: &Value) -> Result<Value, LeafError> {
        use Value::*;
        match (self, a, b) {
            (LeafOp::And, Bool(x), Bool(y)) => Ok(Bool(*x && *y)),
            (LeafOp::Or, Bool(x), Bool(y)) => Ok(Bool(*x || *y)),
            (LeafOp::Xor, Bool(x), Bool(y)) => Ok(Bool(x != y)),
            (LeafOp::Eq, Set(_), _) | (LeafOp::Eq, _, Set(_)) => Err(type_mismatch(self, a, b)),
            (LeafOp::Eq, x, y) => Ok(Bool(x == y)),
            (LeafOp::Lt, Int(x), Int(y)) => Ok(Bool(x < y)),
            (LeafOp::Le, Int(x), Int(y)) => Ok(Bool(x <= y)),
            (LeafOp::Plus, Int(x), Int(y)) => x.checked_add(*y).map(Int).ok_or_else(|| type_mismatch(self, a, b)),
            (LeafOp::Minus, Int(x), Int(y)) => x.checked_sub(*y).map(Int).ok_or_else(|| type_mismatch(self, a, b)),
            (LeafOp::Times, Int(x), Int(y)) => x.checked_mul(*y).map(Int).ok_or_else(|| type_mismatch(self, a, b)),
            (LeafOp::Divide | LeafOp::Mod, Int(_), Int(0)) => Err(LeafError::DivisionByZero),
            (LeafOp::Divide, Int(x), Int(y)) => x.checked_div(*y).map(Int).ok_or_else(|| type_mismatch(self, a, b)),
            (LeafOp::Mod, Int(x), Int(y)) => x.checked_rem(*y).map(Int).ok_or_else(|| type_mismatch(self, a, b)),
            (LeafOp::Union, x, y) => Ok(Value::set([x.clone(), y.clone()])),
            (LeafOp::SetIn, x, y) => {
                let container = y.elements();
                Ok(Bool(x.elements().iter().all(|e| container.contains(e))))
            }
            _ => Err(type_mismatch(self, a, b)),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Add {
    leaves: Vec<(Value, Ref)>,
}

impl Add {
    pub fn constant(value: Value) -> Self {
        Self {
            leaves: vec![(value, Ref::ONE)],
        }
    }

    /// Boolean-valued diagram of `f`.
    pub fn from_bdd(f: Ref) -> Self {
        let leaves = [(Value::Bool(true), f), (Value::Bool(false), -f)]
            .into_iter()
            .filter(|&(_, g)| g != Ref::ZERO)
            .collect();
        Self { leaves }
    }

    /// Build from `(value, guard)` pairs with disjoint guards covering the
    /// space; equal values are merged and empty guards dropped.
    pub fn from_leaves(bdd: &Bdd, leaves: impl IntoIterator<Item = (Value, Ref)>) -> Self {
        let mut merged: Vec<(Value, Ref)> = Vec::new();
        for (value, guard) in leaves {
            if guard == Ref::ZERO {
                continue;
            }
            match merged.iter_mut().find(|(v, _)| *v == value) {
                Some((_, g)) => *g = bdd.apply_or(*g, guard),
                None => merged.push((value, guard)),
            }
        }
        merged.sort_by(|a, b| a.0.cmp(&b.0));
        Self { leaves: merged }
    }

    pub fn leaves(&self) -> &[(Value, Ref)] {
        &self.leaves
    }

    pub fn guards(&self) -> impl Iterator<Item = Ref> + '_ {
        self.leaves.iter().map(|&(_, g)| g)
    }

    /// The single value, if the diagram is constant.
    pub fn as_constant(&self) -> Option<&Value> {
        match self.leaves.as_slice() {
            [(value, _)] => Some(value),
            _ => None,
        }
    }

    /// Guard under which the diagram evaluates to `value`.
    pub fn guard_of(&self, value: &Value) -> Ref {
        self.leaves
            .iter()
            .find(|(v, _)| v == value)
            .map(|&(_, g)| g)
            .unwrap_or(Ref::ZERO)
    }

    pub fn is_boolean(&self) -> bool {
        self.leaves.iter().all(|(v, _)| matches!(v, Value::Bool(_)))
    }

    /// The set where the diagram is `TRUE`, or `None` if some leaf is not boolean.
    pub fn to_bdd(&self) -> Option<Ref> {
        if !self.is_boolean() {
            return None;
        }
        Some(self.guard_of(&Value::Bool(true)))
    }

    pub fn apply_unary<E>(&self, bdd: &Bdd, mut op: impl FnMut(&Value) -> Result<Value, E>) -> Result<Add, E> {
        let mut leaves = Vec::with_capacity(self.leaves.len());
        for (value, guard) in self.leaves.iter() {
            leaves.push((op(value)?, *guard));
        }
        Ok(Add::from_leaves(bdd, leaves))
    }

    pub fn apply_binary<E>(
        &self,
        bdd: &Bdd,
        other: &Add,
        mut op: impl FnMut(&Value, &Value) -> Result<Value, E>,
    ) -> Result<Add, E> {
        let mut leaves = Vec::new();
        for (a, ga) in self.leaves.iter() {
            for (b, gb) in other.leaves.iter() {
                let guard = bdd.apply_and(*ga, *gb);
                if guard != Ref::ZERO {
                    leaves.push((op(a, b)?, guard));
                }
            }
        }
        Ok(Add::from_leaves(bdd, leaves))
    }

    /// `if cond then self else other`, with `cond` a boolean set.
    pub fn ite(bdd: &Bdd, cond: Ref, then: &Add, other: &Add) -> Add {
        let leaves = then
            .leaves
            .iter()
            .map(|(v, g)| (v.clone(), bdd.apply_and(*g, cond)))
            .chain(other.leaves.iter().map(|(v, g)| (v.clone(), bdd.apply_and(*g, -cond))))
            .collect::<Vec<_>>();
        Add::from_leaves(bdd, leaves)
    }

    /// Boolean negation; `None` if some leaf is not boolean.
    pub fn not(&self) -> Option<Add> {
        let f = self.to_bdd()?;
        Some(Add::from_bdd(-f))
    }

    pub fn reference(&self, bdd: &Bdd) {
        for g in self.guards() {
            bdd.reference(g);
        }
    }

    pub fn dereference(&self, bdd: &Bdd) {
        for g in self.guards() {
            bdd.dereference(g);
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_value_set_normalizes() {
        let s = Value::set([Value::Int(3), Value::Int(1), Value::Int(3)]);
        assert_eq!(s, Value::Set(Rc::from(vec![Value::Int(1), Value::Int(3)])));
        assert_eq!(format!("{}", s), "{1, 3}");
        assert_eq!(Value::set([Value::Int(2)]), Value::Int(2));
        assert_eq!(s.elements().len(), 2);
    }

    #[test]
    fn test_leaf_ops() {
        let (a, b) = (Value::Int(7), Value::Int(2));
        assert_eq!(LeafOp::Plus.apply(&a, &b), Ok(Value::Int(9)));
        assert_eq!(LeafOp::Mod.apply(&a, &b), Ok(Value::Int(1)));
        assert_eq!(LeafOp::Lt.apply(&a, &b), Ok(Value::Bool(false)));
        assert_eq!(LeafOp::Divide.apply(&a, &Value::Int(0)), Err(LeafError::DivisionByZero));
        let (min, neg) = (Value::Int(i64::MIN), Value::Int(-1));
        assert!(matches!(LeafOp::Divide.apply(&min, &neg), Err(LeafError::TypeMismatch(_))));
        assert!(matches!(LeafOp::Mod.apply(&min, &neg), Err(LeafError::TypeMismatch(_))));
        assert!(matches!(
            LeafOp::And.apply(&a, &Value::Bool(true)),
            Err(LeafError::TypeMismatch(_))
        ));
        let set = Value::set([Value::sym("a"), Value::sym("b")]);
        assert_eq!(LeafOp::SetIn.apply(&Value::sym("a"), &set), Ok(Value::Bool(true)));
        assert_eq!(LeafOp::SetIn.apply(&Value::sym("c"), &set), Ok(Value::Bool(false)));
    }

    #[test]
    fn test_from_bdd_roundtrip() {
        let bdd = Bdd::default();
        let x = bdd.mk_var(1);
        let add = Add::from_bdd(x);
        assert!(add.is_boolean());
        assert_eq!(add.to_bdd(), Some(x));
        assert_eq!(Add::from_bdd(bdd.one()).as_constant(), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_binary_merges_equal_leaves() {
        let bdd = Bdd::default();
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        // a = x ? 1 : 0, b = y ? 1 : 0
        let a = Add::from_leaves(&bdd, [(Value::Int(1), x), (Value::Int(0), -x)]);
        let b = Add::from_leaves(&bdd, [(Value::Int(1), y), (Value::Int(0), -y)]);

        let sum = a.apply_binary(&bdd, &b, |p, q| LeafOp::Plus.apply(p, q)).unwrap();
        assert_eq!(sum.leaves().len(), 3);
        assert_eq!(sum.guard_of(&Value::Int(1)), bdd.apply_xor(x, y));
        assert_eq!(sum.guard_of(&Value::Int(5)), bdd.zero());

        let eq = a.apply_binary(&bdd, &b, |p, q| LeafOp::Eq.apply(p, q)).unwrap();
        assert_eq!(eq.to_bdd(), Some(bdd.apply_eq(x, y)));
    }

    #[test]
    fn test_ite_and_not() {
        let bdd = Bdd::default();
        let c = bdd.mk_var(1);
        let then = Add::constant(Value::sym("on"));
        let other = Add::constant(Value::sym("off"));
        let add = Add::ite(&bdd, c, &then, &other);
        assert_eq!(add.guard_of(&Value::sym("on")), c);
        assert_eq!(add.to_bdd(), None);
        assert_eq!(add.not(), None);

        let b = Add::from_bdd(c);
        assert_eq!(b.not().and_then(|n| n.to_bdd()), Some(-c));
    }
}
