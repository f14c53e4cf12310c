use thiserror::Error;

/// Modeling errors raised while declaring variables or evaluating
/// expressions. Each carries the source line of the offending expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncError {
    #[error("line {line}: undefined symbol `{name}`")]
    Undefined { name: String, line: u32 },

    #[error("line {line}: `{name}` is ambiguous, it names a {kinds}")]
    Ambiguous { name: String, kinds: String, line: u32 },

    #[error("line {line}: circular definition of `{name}`")]
    CircularDefinition { name: String, line: u32 },

    #[error("line {line}: value {value} is outside the domain of `{name}`")]
    DomainViolation { name: String, value: String, line: u32 },

    #[error("line {line}: expression `{expr}` is not boolean")]
    NotBoolean { expr: String, line: u32 },

    #[error("line {line}: division by zero")]
    DivisionByZero { line: u32 },

    #[error("line {line}: type mismatch: {message}")]
    TypeMismatch { message: String, line: u32 },

    #[error("line {line}: nested next operator")]
    NestedNext { line: u32 },

    #[error("line {line}: next of input variable `{name}`")]
    NextOfInput { name: String, line: u32 },

    #[error("symbol `{name}` is already declared")]
    Redeclared { name: String },

    #[error("variable `{name}` has an empty domain")]
    EmptyDomain { name: String },

    #[error("line {line}: `{name}` is not a variable")]
    NotAVariable { name: String, line: u32 },
}

pub type EncResult<T> = Result<T, EncError>;
