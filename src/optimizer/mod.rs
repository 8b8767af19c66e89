//! Algebra rewriting.
//!
//! Optimizers rewrite an algebra tree into an equivalent, simpler tree before
//! execution, given bindings known to hold for every execution.

mod constant;
mod filter;
mod pipeline;

pub use constant::ConstantOptimizer;
pub use filter::FilterSimplifier;
pub use pipeline::{Optimizer, QueryOptimizer};
