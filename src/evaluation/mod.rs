//! Expression evaluation: functions, aggregates, triple sources and the
//! reference evaluation strategy.

mod aggregate;
mod error;
mod eval;
mod functions;
mod source;
mod strategy;

pub use aggregate::evaluate_aggregate;
pub use error::{EvalError, EvalResult};
pub use eval::{compare_optional, compare_values, effective_boolean, evaluate, evaluate_condition};
pub use functions::{Arity, Function, FunctionImpl, FunctionRegistry};
pub use source::{EmptyTripleSource, MemoryTripleSource, Statement, TripleSource};
pub use strategy::{EvaluationStrategy, StrictEvaluationStrategy};
