//! Plan execution errors.

use thiserror::Error;

use super::node::OutputShape;
use crate::evaluation::EvalError;

/// Result type for plan execution.
pub type ExecuteResult<T> = Result<T, ExecuteError>;

/// Plan execution errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecuteError {
    #[error("evaluation error: {0}")]
    Evaluation(#[from] EvalError),

    #[error("children produce different shapes: left {left}, right {right}")]
    ShapeMismatch { left: OutputShape, right: OutputShape },

    #[error("source error: {0}")]
    Source(String),

    #[error("failed to close iteration: {0}")]
    CloseFailed(String),

    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),
}

impl ExecuteError {
    /// Check if the error comes from the plan itself rather than its data.
    /// Such errors recur on every execution.
    pub fn is_static(&self) -> bool {
        matches!(self, ExecuteError::ShapeMismatch { .. })
    }
}
