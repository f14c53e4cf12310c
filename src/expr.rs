//! Symbolic expressions.
//!
//! Expressions are immutable trees shared through [`ExprRef`]. The encoder
//! memoizes evaluation by node *identity*, so a subexpression reused in
//! several places is compiled once per context.

use std::fmt;
use std::rc::Rc;

pub type ExprRef = Rc<Expr>;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BinOp {
    And,
    Or,
    Xor,
    Xnor,
    Implies,
    Iff,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Times,
    Divide,
    Mod,
    Union,
    SetIn,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "xor",
            BinOp::Xnor => "xnor",
            BinOp::Implies => "->",
            BinOp::Iff => "<->",
            BinOp::Eq => "=",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Plus => "+",
            BinOp::Minus => "-",
            BinOp::Times => "*",
            BinOp::Divide => "/",
            BinOp::Mod => "mod",
            BinOp::Union => "union",
            BinOp::SetIn => "in",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    True,
    False,
    Number(i64),
    /// A name: parameter, constant, variable or define.
    Atom(Rc<str>),
    Next(ExprRef),
    Not(ExprRef),
    UMinus(ExprRef),
    Binary(BinOp, ExprRef, ExprRef),
    Ite(ExprRef, ExprRef, ExprRef),
    /// Branches are tried in order; the conditions must cover every state.
    Case(Vec<(ExprRef, ExprRef)>),
    /// Set literal `{a, b, ...}`.
    Set(Vec<ExprRef>),
    /// `lhs := rhs`, where `lhs` is a variable or `next` of one.
    Assign(ExprRef, ExprRef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    /// Source line, 0 when unknown.
    pub line: u32,
}

impl Expr {
    pub fn new(kind: ExprKind, line: u32) -> ExprRef {
        Rc::new(Expr { kind, line })
    }

    pub fn tt() -> ExprRef {
        Expr::new(ExprKind::True, 0)
    }

    pub fn ff() -> ExprRef {
        Expr::new(ExprKind::False, 0)
    }

    pub fn number(n: i64) -> ExprRef {
        Expr::new(ExprKind::Number(n), 0)
    }

    pub fn atom(name: &str) -> ExprRef {
        Expr::new(ExprKind::Atom(Rc::from(name)), 0)
    }

    pub fn next(e: ExprRef) -> ExprRef {
        Expr::new(ExprKind::Next(e), 0)
    }

    pub fn not(e: ExprRef) -> ExprRef {
        Expr::new(ExprKind::Not(e), 0)
    }

    pub fn neg(e: ExprRef) -> ExprRef {
        Expr::new(ExprKind::UMinus(e), 0)
    }

    pub fn binary(op: BinOp, a: ExprRef, b: ExprRef) -> ExprRef {
        Expr::new(ExprKind::Binary(op, a, b), 0)
    }

    pub fn and(a: ExprRef, b: ExprRef) -> ExprRef {
        Expr::binary(BinOp::And, a, b)
    }

    pub fn or(a: ExprRef, b: ExprRef) -> ExprRef {
        Expr::binary(BinOp::Or, a, b)
    }

    pub fn eq(a: ExprRef, b: ExprRef) -> ExprRef {
        Expr::binary(BinOp::Eq, a, b)
    }

    pub fn ite(c: ExprRef, t: ExprRef, e: ExprRef) -> ExprRef {
        Expr::new(ExprKind::Ite(c, t, e), 0)
    }

    pub fn case(branches: Vec<(ExprRef, ExprRef)>) -> ExprRef {
        Expr::new(ExprKind::Case(branches), 0)
    }

    pub fn set(items: Vec<ExprRef>) -> ExprRef {
        Expr::new(ExprKind::Set(items), 0)
    }

    pub fn assign(lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        Expr::new(ExprKind::Assign(lhs, rhs), 0)
    }

    /// Copy of this node carrying `line`.
    pub fn at(self: &Rc<Self>, line: u32) -> ExprRef {
        Rc::new(Expr {
            kind: self.kind.clone(),
            line,
        })
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::True => write!(f, "TRUE"),
            ExprKind::False => write!(f, "FALSE"),
            ExprKind::Number(n) => write!(f, "{}", n),
            ExprKind::Atom(name) => write!(f, "{}", name),
            ExprKind::Next(e) => write!(f, "next({})", e),
            ExprKind::Not(e) => write!(f, "!({})", e),
            ExprKind::UMinus(e) => write!(f, "-({})", e),
            ExprKind::Binary(op, a, b) => write!(f, "({} {} {})", a, op.symbol(), b),
            ExprKind::Ite(c, t, e) => write!(f, "({} ? {} : {})", c, t, e),
            ExprKind::Case(branches) => {
                write!(f, "case ")?;
                for (c, v) in branches {
                    write!(f, "{} : {}; ", c, v)?;
                }
                write!(f, "esac")
            }
            ExprKind::Set(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
            ExprKind::Assign(lhs, rhs) => write!(f, "{} := {}", lhs, rhs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = Expr::assign(
            Expr::next(Expr::atom("x")),
            Expr::binary(BinOp::Mod, Expr::binary(BinOp::Plus, Expr::atom("x"), Expr::number(1)), Expr::number(3)),
        );
        assert_eq!(e.to_string(), "next(x) := ((x + 1) mod 3)");
    }

    #[test]
    fn test_at_keeps_kind() {
        let e = Expr::atom("y");
        let e7 = e.at(7);
        assert_eq!(e7.line, 7);
        assert_eq!(e7.kind, e.kind);
        assert!(!Rc::ptr_eq(&e, &e7));
    }
}
