//! Symbol table: variables, constants, defines and parameters.
//!
//! Names are qualified by their context (`"ctx.name"`, or just `"name"` in
//! the top-level context). Symbolic constants are global.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::add::Value;
use crate::error::{EncError, EncResult};
use crate::expr::ExprRef;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum VarType {
    Boolean,
    /// Enumeration of symbolic or integer values, in declaration order.
    Enum(Vec<Value>),
    /// Integer range `lo..=hi`.
    Range(i64, i64),
}

impl VarType {
    pub fn values(&self) -> Vec<Value> {
        match self {
            VarType::Boolean => vec![Value::Bool(false), Value::Bool(true)],
            VarType::Enum(values) => values.clone(),
            VarType::Range(lo, hi) => (*lo..=*hi).map(Value::Int).collect(),
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        match (self, value) {
            (VarType::Boolean, Value::Bool(_)) => true,
            (VarType::Enum(values), v) => values.contains(v),
            (VarType::Range(lo, hi), Value::Int(n)) => lo <= n && n <= hi,
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            VarType::Boolean => 2,
            VarType::Enum(values) => values.len(),
            VarType::Range(lo, hi) => {
                if hi < lo {
                    0
                } else {
                    (hi - lo + 1) as usize
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum VarKind {
    State,
    /// State variable that keeps its initial value forever.
    Frozen,
    Input,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: Rc<str>,
    pub ty: VarType,
    pub kind: VarKind,
}

/// An expression bound to the context it must be evaluated in.
#[derive(Debug, Clone)]
pub struct Binding {
    pub body: ExprRef,
    pub context: Rc<str>,
}

/// Outcome of resolving an atom.
#[derive(Debug, Clone)]
pub enum Resolution<'a> {
    Param(&'a Binding),
    Constant(Rc<str>),
    Var(&'a VarDecl),
    Define(Rc<str>, &'a Binding),
}

pub fn qualify(context: &str, name: &str) -> Rc<str> {
    if context.is_empty() {
        Rc::from(name)
    } else {
        Rc::from(format!("{}.{}", context, name))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    vars: HashMap<Rc<str>, VarDecl>,
    constants: HashSet<Rc<str>>,
    defines: HashMap<Rc<str>, Binding>,
    params: HashMap<Rc<str>, Binding>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_fresh(&self, name: &Rc<str>) -> EncResult<()> {
        if self.vars.contains_key(name) || self.defines.contains_key(name) || self.params.contains_key(name) {
            return Err(EncError::Redeclared { name: name.to_string() });
        }
        Ok(())
    }

    /// Declare a variable under its fully qualified name. Symbolic values of
    /// an enumeration become constants.
    pub fn declare_var(&mut self, name: &str, ty: VarType, kind: VarKind) -> EncResult<&VarDecl> {
        let name: Rc<str> = Rc::from(name);
        self.check_fresh(&name)?;
        if ty.is_empty() {
            return Err(EncError::EmptyDomain { name: name.to_string() });
        }
        for value in ty.values() {
            if let Value::Sym(s) = value {
                self.constants.insert(s);
            }
        }
        let decl = VarDecl {
            name: name.clone(),
            ty,
            kind,
        };
        Ok(self.vars.entry(name).or_insert(decl))
    }

    pub fn declare_constant(&mut self, name: &str) {
        self.constants.insert(Rc::from(name));
    }

    pub fn declare_define(&mut self, context: &str, name: &str, body: ExprRef) -> EncResult<()> {
        let qualified = qualify(context, name);
        self.check_fresh(&qualified)?;
        self.defines.insert(
            qualified,
            Binding {
                body,
                context: Rc::from(context),
            },
        );
        Ok(())
    }

    /// Bind formal parameter `name` of `context` to `actual`, evaluated in
    /// `actual_context`.
    pub fn declare_param(&mut self, context: &str, name: &str, actual: ExprRef, actual_context: &str) -> EncResult<()> {
        let qualified = qualify(context, name);
        self.check_fresh(&qualified)?;
        self.params.insert(
            qualified,
            Binding {
                body: actual,
                context: Rc::from(actual_context),
            },
        );
        Ok(())
    }

    pub fn var(&self, name: &str) -> Option<&VarDecl> {
        self.vars.get(name)
    }

    pub fn is_constant(&self, name: &str) -> bool {
        self.constants.contains(name)
    }

    /// Resolve `name` in `context`: parameter, then constant, then declared
    /// symbol. A name matching more than one of those is ambiguous.
    pub fn resolve(&self, context: &str, name: &str, line: u32) -> EncResult<Resolution<'_>> {
        let qualified = qualify(context, name);
        let mut found = Vec::new();

        if let Some(binding) = self.params.get(&qualified) {
            found.push(("parameter", Resolution::Param(binding)));
        }
        if let Some(c) = self.constants.get(name) {
            found.push(("constant", Resolution::Constant(c.clone())));
        }
        if let Some(decl) = self.vars.get(&qualified) {
            found.push(("variable", Resolution::Var(decl)));
        }
        if let Some((key, binding)) = self.defines.get_key_value(&qualified) {
            found.push(("define", Resolution::Define(key.clone(), binding)));
        }

        if found.len() > 1 {
            return Err(EncError::Ambiguous {
                name: qualified.to_string(),
                kinds: found.iter().map(|(k, _)| *k).collect::<Vec<_>>().join(" and a "),
                line,
            });
        }
        match found.pop() {
            Some((_, resolution)) => Ok(resolution),
            None => Err(EncError::Undefined {
                name: qualified.to_string(),
                line,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::expr::Expr;

    #[test]
    fn test_var_types() {
        let ty = VarType::Range(0, 2);
        assert_eq!(ty.len(), 3);
        assert!(ty.contains(&Value::Int(2)));
        assert!(!ty.contains(&Value::Int(3)));
        assert!(VarType::Range(3, 1).is_empty());
        assert_eq!(VarType::Boolean.values(), vec![Value::Bool(false), Value::Bool(true)]);
    }

    #[test]
    fn test_resolution_order() {
        let mut st = SymbolTable::new();
        st.declare_var("x", VarType::Boolean, VarKind::State).unwrap();
        st.declare_define("", "d", Expr::atom("x")).unwrap();
        st.declare_param("m", "p", Expr::atom("x"), "").unwrap();
        st.declare_var("s", VarType::Enum(vec![Value::sym("idle"), Value::sym("busy")]), VarKind::State)
            .unwrap();

        assert!(matches!(st.resolve("", "x", 1), Ok(Resolution::Var(_))));
        assert!(matches!(st.resolve("", "d", 1), Ok(Resolution::Define(_, _))));
        assert!(matches!(st.resolve("m", "p", 1), Ok(Resolution::Param(_))));
        assert!(matches!(st.resolve("", "idle", 1), Ok(Resolution::Constant(_))));
        assert!(matches!(
            st.resolve("", "nope", 4),
            Err(EncError::Undefined { line: 4, .. })
        ));
    }

    #[test]
    fn test_ambiguous_atom() {
        let mut st = SymbolTable::new();
        st.declare_constant("a");
        st.declare_var("a", VarType::Boolean, VarKind::Input).unwrap();
        let err = st.resolve("", "a", 9).unwrap_err();
        assert_eq!(
            err,
            EncError::Ambiguous {
                name: "a".to_string(),
                kinds: "constant and a variable".to_string(),
                line: 9
            }
        );
    }

    #[test]
    fn test_redeclaration() {
        let mut st = SymbolTable::new();
        st.declare_var("x", VarType::Boolean, VarKind::State).unwrap();
        assert!(matches!(
            st.declare_define("", "x", Expr::tt()),
            Err(EncError::Redeclared { .. })
        ));
        assert!(matches!(
            st.declare_var("y", VarType::Enum(vec![]), VarKind::State),
            Err(EncError::EmptyDomain { .. })
        ));
    }
}
