//! Evaluation errors.

use thiserror::Error;

/// Result type for evaluation.
pub type EvalResult<T> = Result<T, EvalError>;

/// Errors raised while evaluating expressions or aggregates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("wrong number of arguments for {function}: expected {expected}, got {actual}")]
    Arity {
        function: String,
        expected: String,
        actual: usize,
    },

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("unbound variable: ?{0}")]
    UnboundVariable(String),

    #[error("variable already bound: ?{0}")]
    AlreadyBound(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("numeric overflow")]
    Overflow,

    #[error("condition is not a boolean: {0}")]
    NotBoolean(String),

    #[error("source error: {0}")]
    Source(String),
}

impl EvalError {
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        EvalError::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
