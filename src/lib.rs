//! relflow - a streaming relational-algebra engine
//!
//! Tuples flow through a pull-based operator tree. Sort-merge joins and
//! filters can push the tuples they reject into discard sinks, and an
//! optimizer folds constant sub-expressions ahead of evaluation.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use relflow::executor::{BufferedSink, DiscardSink, JoinKind, PlanNode};
//! use relflow::tuple;
//!
//! let unmatched = Arc::new(BufferedSink::new());
//! let right_sink: Arc<dyn DiscardSink> = unmatched.clone();
//! let plan = PlanNode::join_with_sinks(
//!     JoinKind::Inner,
//!     PlanNode::values(vec![tuple![1i64, "a"]]),
//!     PlanNode::values(vec![tuple![1i64, "x"], tuple![2i64, "z"]]),
//!     None,
//!     Some(right_sink),
//! );
//! assert_eq!(plan.collect().unwrap(), vec![tuple![1i64, "a", "x"]]);
//! assert_eq!(unmatched.tuples(), vec![tuple![2i64, "z"]]);
//! ```

pub mod algebra;
pub mod config;
pub mod engine;
pub mod evaluation;
pub mod executor;
pub mod optimizer;
pub mod tuple;

pub use config::{ConfigError, EngineConfig};
pub use engine::{EngineError, EngineResult, QueryEngine};
