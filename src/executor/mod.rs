//! Physical plan execution.
//!
//! Uses the Volcano/Iterator model: each opened [`PlanNode`] is a closable
//! iterator producing tuples one at a time. Operators that reject tuples can
//! push them into a [`DiscardSink`].

mod error;
mod graph;
mod iteration;
mod join;
mod node;
mod operators;
mod sink;
mod source;

pub use error::{ExecuteError, ExecuteResult};
pub use graph::{GraphEdge, GraphNode, PlanGraph};
pub use iteration::{BoxedIter, Iteration, Operator, TupleIter, TupleList};
pub use join::{JoinKind, JoinOp};
pub use node::{OutputShape, PlanNode, PlanNodeId, PlanOperator, TupleCondition};
pub use operators::{FilterOp, LimitOp, ProjectOp, SortOp, UnionOp, UniqueOp};
pub use sink::{BufferedSink, DiscardSink};
pub use source::{MemorySource, OrderedSource};
