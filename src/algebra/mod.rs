//! The logical algebra tree.
//!
//! Tuple expressions (relational operators over binding sets) and value
//! expressions (scalar computations) make up the tree the optimizer rewrites.
//! The physical counterpart lives in [`crate::executor`].

mod bindings;
mod expr;
mod tuple_expr;

pub use bindings::BindingSet;
pub use expr::{AggregateExpr, AggregateOp, CompareOp, MathOp, ValueExpr};
pub use tuple_expr::{ExtensionElem, GroupElem, OrderKey, TermPattern, TupleExpr};
