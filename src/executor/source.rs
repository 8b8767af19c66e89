//! Leaf data sources for plan scans.

use super::error::ExecuteResult;
use super::iteration::{BoxedIter, Iteration, TupleList};
use super::node::OutputShape;
use crate::tuple::Tuple;

/// Produces tuples sorted ascending by the tuple order.
///
/// Sortedness is a precondition of merge joins and unions over the scan; it is
/// not verified.
pub trait OrderedSource: Send + Sync {
    /// Open a fresh iteration over the source.
    fn scan(&self) -> ExecuteResult<BoxedIter<'_>>;

    fn shape(&self) -> OutputShape {
        OutputShape::Statements
    }

    fn label(&self) -> String {
        "source".into()
    }
}

/// An in-memory tuple list.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    tuples: Vec<Tuple>,
    shape: OutputShape,
}

impl MemorySource {
    /// A source over tuples that are already sorted.
    pub fn new(name: impl Into<String>, tuples: Vec<Tuple>) -> Self {
        Self {
            name: name.into(),
            tuples,
            shape: OutputShape::Statements,
        }
    }

    /// A source over tuples in any order; they are sorted here.
    pub fn sorted(name: impl Into<String>, mut tuples: Vec<Tuple>) -> Self {
        tuples.sort();
        Self::new(name, tuples)
    }

    pub fn with_shape(mut self, shape: OutputShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn tuples(&self) -> &[Tuple] {
        &self.tuples
    }
}

impl OrderedSource for MemorySource {
    fn scan(&self) -> ExecuteResult<BoxedIter<'_>> {
        Ok(Iteration::boxed("memory scan", TupleList::new(self.tuples.clone())))
    }

    fn shape(&self) -> OutputShape {
        self.shape
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}
