//! Variable encoder.
//!
//! [`BddEnc`] maps symbolic variables onto vectors of manager variables,
//! keeps the current/next correspondence, evaluates expressions into leaf
//! partitions and builds the domain masks.
//!
//! # Encoding
//!
//! A variable with values `v₀, ..., vₙ₋₁` uses `⌈log₂ n⌉` bits. The value
//! list is split in halves, the first bit choosing between them, and so on
//! recursively. When `n` is not a power of two some halves run out of
//! values early and their leaves do not test the remaining bits; the
//! [mask](BddEnc::mask_for) removes those duplicates.
//!
//! Each bit of a state variable is a pair of adjacent ids `(current, next)`
//! kept together as a reordering group. Input bits have no next copy.

mod cache;
mod mask;
mod snapshot;

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use log::debug;
use num_bigint::BigUint;

pub use self::cache::PinnedAdd;
pub use self::snapshot::EncSnapshot;

use self::cache::{EncCache, EvalStatus, ExprKey};
use self::mask::MaskCache;
use crate::add::{Add, LeafError, LeafOp, Value};
use crate::bdd::{Bdd, Root};
use crate::error::{EncError, EncResult};
use crate::expr::{BinOp, ExprKind, ExprRef};
use crate::reference::Ref;
use crate::sat::Minterm;
use crate::symbols::{qualify, Binding, Resolution, SymbolTable, VarDecl, VarKind, VarType};
use crate::types::Var;

/// Current/next renaming tables, total over all allocated ids.
///
/// Slot `i` describes variable `i + 1`; ids beyond the tables, input bits
/// and next bits (in `to_next`) map to themselves.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct VarShift {
    to_next: Vec<Var>,
    to_current: Vec<Var>,
}

impl VarShift {
    pub fn new() -> Self {
        Self::default()
    }

    fn grow(&mut self, var: Var) {
        while self.to_next.len() < var.index() {
            let v = Var::new(self.to_next.len() as u32 + 1);
            self.to_next.push(v);
            self.to_current.push(v);
        }
    }

    pub fn add_pair(&mut self, current: Var, next: Var) {
        self.grow(current.max(next));
        self.to_next[current.index() - 1] = next;
        self.to_current[next.index() - 1] = current;
    }

    pub fn add_input(&mut self, var: Var) {
        self.grow(var);
    }

    pub fn next_of_current(&self, var: Var) -> Var {
        self.to_next.get(var.index() - 1).copied().unwrap_or(var)
    }

    pub fn current_of_next(&self, var: Var) -> Var {
        self.to_current.get(var.index() - 1).copied().unwrap_or(var)
    }

    pub fn to_next_table(&self) -> &[Var] {
        &self.to_next
    }

    pub fn to_current_table(&self) -> &[Var] {
        &self.to_current
    }

    /// Union of two shifts over disjoint variable sets.
    pub fn merge(&self, other: &VarShift) -> VarShift {
        let mut merged = self.clone();
        if let Some(&last) = other.to_next.last() {
            merged.grow(Var::new(other.to_next.len() as u32).max(last));
        }
        for (i, (&n, &c)) in other.to_next.iter().zip(other.to_current.iter()).enumerate() {
            let v = Var::new(i as u32 + 1);
            if n != v {
                merged.to_next[i] = n;
            }
            if c != v {
                merged.to_current[i] = c;
            }
        }
        merged
    }
}

/// The three variable-class cubes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VarCubes {
    pub state: Ref,
    pub input: Ref,
    pub next: Ref,
}

/// Cube accumulators, grown as variables are declared.
#[derive(Debug, Clone)]
pub(crate) struct Cubes {
    state: Root,
    input: Root,
    next: Root,
    frozen: Root,
    state_vars: Vec<Var>,
    input_vars: Vec<Var>,
    next_vars: Vec<Var>,
}

impl Cubes {
    fn new(bdd: &Rc<Bdd>) -> Self {
        Self {
            state: Root::new(bdd, bdd.one()),
            input: Root::new(bdd, bdd.one()),
            next: Root::new(bdd, bdd.one()),
            frozen: Root::new(bdd, bdd.one()),
            state_vars: Vec::new(),
            input_vars: Vec::new(),
            next_vars: Vec::new(),
        }
    }
}

/// A declared variable with its bits and encodings.
#[derive(Debug, Clone)]
pub struct EncVar {
    pub decl: VarDecl,
    /// Current-state bits, most significant first.
    pub bits: Vec<Var>,
    /// Next-state bits, empty for inputs.
    pub next_bits: Vec<Var>,
    encoding: PinnedAdd,
    next_encoding: Option<PinnedAdd>,
}

impl EncVar {
    pub fn encoding(&self) -> &Add {
        self.encoding.get()
    }

    pub fn next_encoding(&self) -> Option<&Add> {
        self.next_encoding.as_ref().map(|p| p.get())
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct VarTable {
    list: Vec<EncVar>,
    index: HashMap<Rc<str>, usize>,
}

impl VarTable {
    fn get(&self, name: &str) -> Option<&EncVar> {
        self.index.get(name).map(|&i| &self.list[i])
    }

    fn push(&mut self, var: EncVar) {
        self.index.insert(var.decl.name.clone(), self.list.len());
        self.list.push(var);
    }

    fn iter(&self) -> impl Iterator<Item = &EncVar> {
        self.list.iter()
    }
}

/// Owned outcome of atom resolution.
enum Atom {
    Bound(Rc<str>, Binding),
    Constant(Rc<str>),
    Var(Rc<str>, VarKind),
    Define(Rc<str>, Binding),
}

fn bits_for(values: usize) -> usize {
    if values <= 1 {
        0
    } else {
        (usize::BITS - (values - 1).leading_zeros()) as usize
    }
}

fn encode(bdd: &Bdd, values: &[Value], bits: &[Var]) -> Add {
    match bits.split_first() {
        Some((&top, rest)) if values.len() > 1 => {
            let half = values.len().div_ceil(2);
            let low = encode(bdd, &values[..half], rest);
            let high = encode(bdd, &values[half..], rest);
            Add::ite(bdd, bdd.var(top), &high, &low)
        }
        _ => Add::constant(values[0].clone()),
    }
}

fn leaf_error(err: LeafError, line: u32) -> EncError {
    match err {
        LeafError::DivisionByZero => EncError::DivisionByZero { line },
        LeafError::TypeMismatch(message) => EncError::TypeMismatch { message, line },
    }
}

/// Lower a syntactic operator to a leaf operation plus polarity:
/// `(op, negate left operand, negate result)`.
fn lower(op: BinOp) -> (LeafOp, bool, bool) {
    match op {
        BinOp::And => (LeafOp::And, false, false),
        BinOp::Or => (LeafOp::Or, false, false),
        BinOp::Xor => (LeafOp::Xor, false, false),
        BinOp::Xnor | BinOp::Iff => (LeafOp::Xor, false, true),
        BinOp::Implies => (LeafOp::Or, true, false),
        BinOp::Eq => (LeafOp::Eq, false, false),
        BinOp::NotEq => (LeafOp::Eq, false, true),
        BinOp::Lt => (LeafOp::Lt, false, false),
        BinOp::Le => (LeafOp::Le, false, false),
        BinOp::Gt => (LeafOp::Le, false, true),
        BinOp::Ge => (LeafOp::Lt, false, true),
        BinOp::Plus => (LeafOp::Plus, false, false),
        BinOp::Minus => (LeafOp::Minus, false, false),
        BinOp::Times => (LeafOp::Times, false, false),
        BinOp::Divide => (LeafOp::Divide, false, false),
        BinOp::Mod => (LeafOp::Mod, false, false),
        BinOp::Union => (LeafOp::Union, false, false),
        BinOp::SetIn => (LeafOp::SetIn, false, false),
    }
}

pub struct BddEnc {
    bdd: Rc<Bdd>,
    symbols: SymbolTable,
    vars: VarTable,
    shift: VarShift,
    cubes: Cubes,
    masks: MaskCache,
    cache: EncCache,
    pushed: bool,
}

impl BddEnc {
    pub fn new(bdd: &Rc<Bdd>) -> Self {
        Self {
            bdd: Rc::clone(bdd),
            symbols: SymbolTable::new(),
            vars: VarTable::default(),
            shift: VarShift::new(),
            cubes: Cubes::new(bdd),
            masks: MaskCache::default(),
            cache: EncCache::default(),
            pushed: false,
        }
    }

    pub fn bdd(&self) -> &Rc<Bdd> {
        &self.bdd
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }
}

// Declarations
impl BddEnc {
    /// Declare a state variable: one adjacent `(current, next)` id pair per
    /// bit, each pair grouped for reordering.
    pub fn declare_state_variable(&mut self, name: &str, ty: VarType) -> EncResult<()> {
        self.declare_state_like(name, ty, VarKind::State)
    }

    /// Declare a state variable that never changes. The implied
    /// `next(name) = name` constraint is accumulated in
    /// [`frozen_constraint`](BddEnc::frozen_constraint).
    pub fn declare_frozen_variable(&mut self, name: &str, ty: VarType) -> EncResult<()> {
        self.declare_state_like(name, ty, VarKind::Frozen)
    }

    fn declare_state_like(&mut self, name: &str, ty: VarType, kind: VarKind) -> EncResult<()> {
        let decl = self.symbols.declare_var(name, ty, kind)?.clone();
        let n = bits_for(decl.ty.len());

        let mut bits = Vec::with_capacity(n);
        let mut next_bits = Vec::with_capacity(n);
        for _ in 0..n {
            let current = self.bdd.new_var();
            let next = self.bdd.new_var();
            self.bdd.new_group(current, 2);
            self.shift.add_pair(current, next);
            bits.push(current);
            next_bits.push(next);
        }

        let values = decl.ty.values();
        let encoding = encode(&self.bdd, &values, &bits);
        let next_encoding = encode(&self.bdd, &values, &next_bits);

        let bdd = &self.bdd;
        let cubes = &mut self.cubes;
        cubes.state.set(bdd.apply_and(cubes.state.get(), bdd.var_cube(bits.iter().copied())));
        cubes.next.set(bdd.apply_and(cubes.next.get(), bdd.var_cube(next_bits.iter().copied())));
        cubes.state_vars.extend(bits.iter().copied());
        cubes.next_vars.extend(next_bits.iter().copied());
        if kind == VarKind::Frozen {
            let same = bits
                .iter()
                .zip(next_bits.iter())
                .map(|(&c, &n)| bdd.apply_eq(bdd.var(c), bdd.var(n)));
            let same = bdd.apply_and_many(same);
            cubes.frozen.set(bdd.apply_and(cubes.frozen.get(), same));
        }
        self.masks.invalidate_classes();

        debug!("declare {:?} variable {} with bits {:?} / {:?}", kind, name, bits, next_bits);
        self.vars.push(EncVar {
            decl,
            bits,
            next_bits,
            encoding: PinnedAdd::new(&self.bdd, encoding),
            next_encoding: Some(PinnedAdd::new(&self.bdd, next_encoding)),
        });
        Ok(())
    }

    /// Declare an input variable: one id per bit, no next copy.
    pub fn declare_input_variable(&mut self, name: &str, ty: VarType) -> EncResult<()> {
        let decl = self.symbols.declare_var(name, ty, VarKind::Input)?.clone();
        let n = bits_for(decl.ty.len());

        let mut bits = Vec::with_capacity(n);
        for _ in 0..n {
            let v = self.bdd.new_var();
            self.shift.add_input(v);
            bits.push(v);
        }
        let encoding = encode(&self.bdd, &decl.ty.values(), &bits);

        let bdd = &self.bdd;
        let cubes = &mut self.cubes;
        cubes.input.set(bdd.apply_and(cubes.input.get(), bdd.var_cube(bits.iter().copied())));
        cubes.input_vars.extend(bits.iter().copied());
        self.masks.invalidate_classes();

        debug!("declare input variable {} with bits {:?}", name, bits);
        self.vars.push(EncVar {
            decl,
            bits,
            next_bits: Vec::new(),
            encoding: PinnedAdd::new(&self.bdd, encoding),
            next_encoding: None,
        });
        Ok(())
    }

    pub fn declare_constant(&mut self, name: &str) {
        self.symbols.declare_constant(name);
    }

    pub fn declare_define(&mut self, context: &str, name: &str, body: ExprRef) -> EncResult<()> {
        self.symbols.declare_define(context, name, body)
    }

    pub fn declare_param(&mut self, context: &str, name: &str, actual: ExprRef, actual_context: &str) -> EncResult<()> {
        self.symbols.declare_param(context, name, actual, actual_context)
    }
}

// Evaluation
impl BddEnc {
    /// Compile `expr` in `context` into a leaf partition.
    pub fn evaluate(&mut self, expr: &ExprRef, context: &str) -> EncResult<Add> {
        self.eval(expr, &Rc::from(context), false)
    }

    /// Compile a boolean expression into a set.
    pub fn evaluate_bdd(&mut self, expr: &ExprRef, context: &str) -> EncResult<Ref> {
        self.eval_bool(expr, &Rc::from(context), false)
    }

    /// Number of memoized evaluation results.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn eval_bool(&mut self, expr: &ExprRef, ctx: &Rc<str>, in_next: bool) -> EncResult<Ref> {
        let add = self.eval(expr, ctx, in_next)?;
        add.to_bdd().ok_or_else(|| EncError::NotBoolean {
            expr: expr.to_string(),
            line: expr.line,
        })
    }

    fn eval(&mut self, expr: &ExprRef, ctx: &Rc<str>, in_next: bool) -> EncResult<Add> {
        let key = (ExprKey(expr.clone()), ctx.clone(), in_next);
        if let Some(add) = self.cache.expr(&key) {
            return Ok(add);
        }
        let add = self.eval_uncached(expr, ctx, in_next)?;
        self.cache.insert_expr(&self.bdd, key, &add);
        Ok(add)
    }

    fn eval_uncached(&mut self, expr: &ExprRef, ctx: &Rc<str>, in_next: bool) -> EncResult<Add> {
        let line = expr.line;
        match &expr.kind {
            ExprKind::True => Ok(Add::constant(Value::Bool(true))),
            ExprKind::False => Ok(Add::constant(Value::Bool(false))),
            ExprKind::Number(n) => Ok(Add::constant(Value::Int(*n))),
            ExprKind::Atom(name) => self.eval_atom(name, ctx, in_next, line),
            ExprKind::Next(inner) => {
                if in_next {
                    return Err(EncError::NestedNext { line });
                }
                self.eval(inner, ctx, true)
            }
            ExprKind::Not(inner) => {
                let f = self.eval_bool(inner, ctx, in_next)?;
                Ok(Add::from_bdd(-f))
            }
            ExprKind::UMinus(inner) => {
                let a = self.eval(inner, ctx, in_next)?;
                a.apply_unary(&self.bdd, |v| match v {
                    Value::Int(n) => n.checked_neg().map(Value::Int).ok_or_else(|| EncError::TypeMismatch {
                        message: format!("cannot negate {}", n),
                        line,
                    }),
                    other => Err(EncError::TypeMismatch {
                        message: format!("unary minus applied to {}", other),
                        line,
                    }),
                })
            }
            ExprKind::Binary(op, a, b) => self.eval_binary(*op, a, b, ctx, in_next, line),
            ExprKind::Ite(c, t, e) => {
                let cond = self.eval_bool(c, ctx, in_next)?;
                let then = self.eval(t, ctx, in_next)?;
                let other = self.eval(e, ctx, in_next)?;
                Ok(Add::ite(&self.bdd, cond, &then, &other))
            }
            ExprKind::Case(branches) => {
                let mut remaining = self.bdd.one();
                let mut leaves = Vec::new();
                for (cond, value) in branches {
                    let c = self.eval_bool(cond, ctx, in_next)?;
                    let v = self.eval(value, ctx, in_next)?;
                    let guard = self.bdd.apply_and(remaining, c);
                    for (leaf, g) in v.leaves() {
                        leaves.push((leaf.clone(), self.bdd.apply_and(*g, guard)));
                    }
                    remaining = self.bdd.apply_and(remaining, -c);
                    if self.bdd.is_zero(remaining) {
                        break;
                    }
                }
                if !self.bdd.is_zero(remaining) {
                    return Err(EncError::TypeMismatch {
                        message: "case conditions are not exhaustive".to_string(),
                        line,
                    });
                }
                Ok(Add::from_leaves(&self.bdd, leaves))
            }
            ExprKind::Set(items) => {
                let mut acc: Option<Add> = None;
                for item in items {
                    let a = self.eval(item, ctx, in_next)?;
                    acc = Some(match acc {
                        None => a,
                        Some(prev) => prev
                            .apply_binary(&self.bdd, &a, |x, y| LeafOp::Union.apply(x, y))
                            .map_err(|e| leaf_error(e, line))?,
                    });
                }
                acc.ok_or(EncError::TypeMismatch {
                    message: "empty set literal".to_string(),
                    line,
                })
            }
            ExprKind::Assign(lhs, rhs) => self.eval_assign(lhs, rhs, ctx, in_next, line),
        }
    }

    fn eval_binary(
        &mut self,
        op: BinOp,
        a: &ExprRef,
        b: &ExprRef,
        ctx: &Rc<str>,
        in_next: bool,
        line: u32,
    ) -> EncResult<Add> {
        let (leaf, negate_left, negate_result) = lower(op);
        let left = if negate_left {
            Add::from_bdd(-self.eval_bool(a, ctx, in_next)?)
        } else {
            self.eval(a, ctx, in_next)?
        };
        let right = self.eval(b, ctx, in_next)?;
        let res = left
            .apply_binary(&self.bdd, &right, |x, y| leaf.apply(x, y))
            .map_err(|e| leaf_error(e, line))?;
        if negate_result {
            res.not().ok_or_else(|| EncError::TypeMismatch {
                message: format!("{:?} does not yield a boolean", op),
                line,
            })
        } else {
            Ok(res)
        }
    }

    fn resolve(&self, ctx: &str, name: &str, line: u32) -> EncResult<Atom> {
        Ok(match self.symbols.resolve(ctx, name, line)? {
            Resolution::Param(b) => Atom::Bound(qualify(ctx, name), b.clone()),
            Resolution::Constant(c) => Atom::Constant(c),
            Resolution::Var(decl) => Atom::Var(decl.name.clone(), decl.kind),
            Resolution::Define(name, b) => Atom::Define(name, b.clone()),
        })
    }

    fn eval_atom(&mut self, name: &str, ctx: &Rc<str>, in_next: bool, line: u32) -> EncResult<Add> {
        match self.resolve(ctx, name, line)? {
            Atom::Bound(qualified, binding) => {
                let key: Rc<str> = Rc::from(format!("param({}){}", qualified, if in_next { "'" } else { "" }));
                if self.cache.status(&key) == Some(EvalStatus::Evaluating) {
                    return Err(EncError::CircularDefinition {
                        name: qualified.to_string(),
                        line,
                    });
                }
                self.cache.set_status(key.clone(), EvalStatus::Evaluating);
                let res = self.eval(&binding.body, &binding.context, in_next);
                self.cache.clear_status(&key);
                res
            }
            Atom::Constant(c) => {
                if let Some(add) = self.cache.name(&c) {
                    return Ok(add);
                }
                let add = Add::constant(Value::Sym(c.clone()));
                self.cache.insert_name(&self.bdd, c, &add);
                Ok(add)
            }
            Atom::Var(qualified, kind) => {
                let var = self.vars.get(&qualified).ok_or_else(|| EncError::Undefined {
                    name: qualified.to_string(),
                    line,
                })?;
                if !in_next {
                    return Ok(var.encoding().clone());
                }
                match (kind, var.next_encoding()) {
                    (VarKind::Input, _) | (_, None) => Err(EncError::NextOfInput {
                        name: qualified.to_string(),
                        line,
                    }),
                    (_, Some(next)) => Ok(next.clone()),
                }
            }
            Atom::Define(qualified, binding) => {
                let key: Rc<str> = if in_next {
                    Rc::from(format!("next({})", qualified))
                } else {
                    qualified.clone()
                };
                if let Some(add) = self.cache.name(&key) {
                    return Ok(add);
                }
                if self.cache.status(&key) == Some(EvalStatus::Evaluating) {
                    return Err(EncError::CircularDefinition {
                        name: qualified.to_string(),
                        line,
                    });
                }
                self.cache.set_status(key.clone(), EvalStatus::Evaluating);
                match self.eval(&binding.body, &binding.context, in_next) {
                    Ok(add) => {
                        self.cache.set_status(key.clone(), EvalStatus::Done);
                        self.cache.insert_name(&self.bdd, key, &add);
                        Ok(add)
                    }
                    Err(e) => {
                        self.cache.clear_status(&key);
                        Err(e)
                    }
                }
            }
        }
    }

    fn eval_assign(
        &mut self,
        lhs: &ExprRef,
        rhs: &ExprRef,
        ctx: &Rc<str>,
        in_next: bool,
        line: u32,
    ) -> EncResult<Add> {
        let (target, next) = match &lhs.kind {
            ExprKind::Next(inner) => (inner, true),
            _ => (lhs, false),
        };
        if next && in_next {
            return Err(EncError::NestedNext { line });
        }
        let not_a_variable = || EncError::NotAVariable {
            name: lhs.to_string(),
            line,
        };
        let ExprKind::Atom(name) = &target.kind else {
            return Err(not_a_variable());
        };
        let Atom::Var(qualified, kind) = self.resolve(ctx, name, line)? else {
            return Err(not_a_variable());
        };

        let var = self.vars.get(&qualified).ok_or_else(not_a_variable)?;
        let ty = var.decl.ty.clone();
        let encoding = if next || in_next {
            match (kind, var.next_encoding()) {
                (VarKind::Input, _) | (_, None) => {
                    return Err(EncError::NextOfInput {
                        name: qualified.to_string(),
                        line,
                    })
                }
                (_, Some(next)) => next.clone(),
            }
        } else {
            var.encoding().clone()
        };

        let value = self.eval(rhs, ctx, in_next)?;
        let bdd = &self.bdd;
        let mut relation = bdd.zero();
        for (leaf, guard) in value.leaves() {
            let mut allowed = bdd.zero();
            for e in leaf.elements() {
                if !ty.contains(&e) {
                    return Err(EncError::DomainViolation {
                        name: qualified.to_string(),
                        value: e.to_string(),
                        line,
                    });
                }
                allowed = bdd.apply_or(allowed, encoding.guard_of(&e));
            }
            relation = bdd.apply_or(relation, bdd.apply_and(*guard, allowed));
        }
        Ok(Add::from_bdd(relation))
    }
}

// Masks
impl BddEnc {
    /// Mask of a single variable: one bit pattern per domain value.
    pub fn mask_for(&mut self, name: &str) -> EncResult<Ref> {
        if let Some(mask) = self.masks.vars.get(name) {
            return Ok(mask.get());
        }
        let var = self.vars.get(name).ok_or_else(|| EncError::Undefined {
            name: name.to_string(),
            line: 0,
        })?;
        let mask = {
            let _suspended = self.bdd.suspend_auto_reorder();
            mask::mask_of(&self.bdd, var.encoding(), &var.bits)
        };
        self.masks.vars.insert(var.decl.name.clone(), Root::new(&self.bdd, mask));
        Ok(mask)
    }

    pub fn mask_for_vars(&mut self, names: &[&str]) -> EncResult<Ref> {
        let mut mask = self.bdd.one();
        for name in names {
            let m = self.mask_for(name)?;
            mask = self.bdd.apply_and(mask, m);
        }
        Ok(mask)
    }

    /// Conjunction of the masks of the variables whose bits all belong to
    /// `class`. Variables declared before a pushed session are left out.
    fn class_mask(&mut self, class: &[Var]) -> Ref {
        let class: HashSet<Var> = class.iter().copied().collect();
        let names: Vec<Rc<str>> = self
            .vars
            .iter()
            .filter(|v| !v.bits.is_empty() && v.bits.iter().all(|b| class.contains(b)))
            .map(|v| v.decl.name.clone())
            .collect();
        let mut mask = self.bdd.one();
        for name in names {
            // Every listed name is a declared variable.
            if let Ok(m) = self.mask_for(&name) {
                mask = self.bdd.apply_and(mask, m);
            }
        }
        mask
    }

    pub fn state_vars_mask(&mut self) -> Ref {
        if let Some(mask) = &self.masks.state {
            return mask.get();
        }
        let class = self.cubes.state_vars.clone();
        let mask = self.class_mask(&class);
        self.masks.state = Some(Root::new(&self.bdd, mask));
        mask
    }

    pub fn input_vars_mask(&mut self) -> Ref {
        if let Some(mask) = &self.masks.input {
            return mask.get();
        }
        let class = self.cubes.input_vars.clone();
        let mask = self.class_mask(&class);
        self.masks.input = Some(Root::new(&self.bdd, mask));
        mask
    }

    pub fn state_input_mask(&mut self) -> Ref {
        if let Some(mask) = &self.masks.state_input {
            return mask.get();
        }
        let state = self.state_vars_mask();
        let input = self.input_vars_mask();
        let mask = self.bdd.apply_and(state, input);
        self.masks.state_input = Some(Root::new(&self.bdd, mask));
        mask
    }
}

// Cubes, permutation and ordering
impl BddEnc {
    pub fn state_cube(&self) -> Ref {
        self.cubes.state.get()
    }

    pub fn input_cube(&self) -> Ref {
        self.cubes.input.get()
    }

    pub fn next_cube(&self) -> Ref {
        self.cubes.next.get()
    }

    pub fn var_cubes(&self) -> VarCubes {
        VarCubes {
            state: self.state_cube(),
            input: self.input_cube(),
            next: self.next_cube(),
        }
    }

    /// Conjunction of `next(x) = x` over all frozen variables.
    pub fn frozen_constraint(&self) -> Ref {
        self.cubes.frozen.get()
    }

    pub fn state_vars(&self) -> &[Var] {
        &self.cubes.state_vars
    }

    pub fn input_vars(&self) -> &[Var] {
        &self.cubes.input_vars
    }

    pub fn next_vars(&self) -> &[Var] {
        &self.cubes.next_vars
    }

    pub fn shift(&self) -> &VarShift {
        &self.shift
    }

    pub fn next_of_current(&self, var: Var) -> Var {
        self.shift.next_of_current(var)
    }

    pub fn current_of_next(&self, var: Var) -> Var {
        self.shift.current_of_next(var)
    }

    pub fn state_to_next(&self, f: Ref) -> Ref {
        self.bdd.permute(f, self.shift.to_next_table())
    }

    pub fn next_to_state(&self, f: Ref) -> Ref {
        self.bdd.permute(f, self.shift.to_current_table())
    }

    pub fn var(&self, name: &str) -> Option<&EncVar> {
        self.vars.get(name)
    }

    pub fn var_bits(&self, name: &str) -> Option<&[Var]> {
        self.vars.get(name).map(|v| v.bits.as_slice())
    }

    /// Declared variable names in the manager's current level order.
    pub fn ordering(&self) -> Vec<Rc<str>> {
        let mut owner = HashMap::new();
        for var in self.vars.iter() {
            for &bit in var.bits.iter().chain(var.next_bits.iter()) {
                owner.insert(bit, var.decl.name.clone());
            }
        }
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for bit in self.bdd.ordering() {
            if let Some(name) = owner.get(&bit) {
                if seen.insert(name.clone()) {
                    names.push(name.clone());
                }
            }
        }
        names
    }
}

// Counting and decoding
impl BddEnc {
    fn project(&self, f: Ref, keep_state: bool, keep_input: bool) -> Ref {
        let mut cube = self.next_cube();
        if !keep_state {
            cube = self.bdd.apply_and(cube, self.state_cube());
        }
        if !keep_input {
            cube = self.bdd.apply_and(cube, self.input_cube());
        }
        self.bdd.exists(f, cube)
    }

    /// Number of states in `f`, projected onto the state variables and
    /// corrected by the state mask.
    pub fn count_states(&mut self, f: Ref) -> BigUint {
        let mask = self.state_vars_mask();
        let g = self.project(self.bdd.apply_and(f, mask), true, false);
        self.bdd.sat_count(g, self.cubes.state_vars.len())
    }

    pub fn count_inputs(&mut self, f: Ref) -> BigUint {
        let mask = self.input_vars_mask();
        let g = self.project(self.bdd.apply_and(f, mask), false, true);
        self.bdd.sat_count(g, self.cubes.input_vars.len())
    }

    pub fn count_states_inputs(&mut self, f: Ref) -> BigUint {
        let mask = self.state_input_mask();
        let g = self.project(self.bdd.apply_and(f, mask), true, true);
        self.bdd
            .sat_count(g, self.cubes.state_vars.len() + self.cubes.input_vars.len())
    }

    /// One state of `f`, as an assignment to the state bits.
    pub fn pick_one_state(&mut self, f: Ref) -> Option<Minterm> {
        let mask = self.state_vars_mask();
        let g = self.project(self.bdd.apply_and(f, mask), true, false);
        self.bdd.pick_one_minterm(g, &self.cubes.state_vars)
    }

    pub fn pick_one_input(&mut self, f: Ref) -> Option<Minterm> {
        let mask = self.input_vars_mask();
        let g = self.project(self.bdd.apply_and(f, mask), false, true);
        self.bdd.pick_one_minterm(g, &self.cubes.input_vars)
    }

    pub fn pick_all_states(&mut self, f: Ref) -> Vec<Minterm> {
        let mask = self.state_vars_mask();
        let g = self.project(self.bdd.apply_and(f, mask), true, false);
        self.bdd.all_minterms(g, &self.cubes.state_vars)
    }

    /// Value of variable `name` under `minterm` (bits absent from it read as false).
    pub fn value_of(&self, name: &str, minterm: &[(Var, bool)]) -> Option<Value> {
        let var = self.vars.get(name)?;
        let assignment: HashMap<Var, bool> = minterm.iter().copied().collect();
        var.encoding()
            .leaves()
            .iter()
            .find(|(_, guard)| self.bdd.eval(*guard, |v| assignment.get(&v).copied().unwrap_or(false)))
            .map(|(value, _)| value.clone())
    }
}
