//! Discard sinks.
//!
//! Operators that reject tuples (joins, filters) can route them to a sink
//! instead of dropping them. Sinks are pushed to while the operator is being
//! pulled, so they take `&self` and synchronize internally.

use parking_lot::Mutex;
use tracing::trace;

use super::node::PlanNodeId;
use crate::tuple::Tuple;

/// Receives tuples rejected by an operator.
pub trait DiscardSink: Send + Sync {
    fn accept(&self, tuple: Tuple);

    fn label(&self) -> String {
        "DiscardSink".into()
    }

    /// Plan node id, if the sink also appears in the plan graph.
    fn node_id(&self) -> Option<PlanNodeId> {
        None
    }

    /// Record the nodes that push into this sink. Diagnostic only.
    fn receive_parents(&self, _parents: Vec<PlanNodeId>) {}
}

/// A sink that buffers pushed tuples and replays them when opened as a plan
/// leaf (see [`PlanNode::buffered`](super::PlanNode::buffered)).
#[derive(Debug)]
pub struct BufferedSink {
    id: PlanNodeId,
    tuples: Mutex<Vec<Tuple>>,
    parents: Mutex<Vec<PlanNodeId>>,
}

impl Default for BufferedSink {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferedSink {
    pub fn new() -> Self {
        Self {
            id: PlanNodeId::new(),
            tuples: Mutex::new(Vec::new()),
            parents: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> PlanNodeId {
        self.id
    }

    /// Copy of the buffered tuples, in push order.
    pub fn tuples(&self) -> Vec<Tuple> {
        self.tuples.lock().clone()
    }

    /// Take the buffered tuples, leaving the buffer empty.
    pub fn drain(&self) -> Vec<Tuple> {
        std::mem::take(&mut *self.tuples.lock())
    }

    pub fn len(&self) -> usize {
        self.tuples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.lock().is_empty()
    }

    pub fn clear(&self) {
        self.tuples.lock().clear();
    }

    pub fn parents(&self) -> Vec<PlanNodeId> {
        self.parents.lock().clone()
    }
}

impl DiscardSink for BufferedSink {
    fn accept(&self, tuple: Tuple) {
        trace!("sink {} buffered {}", self.id, tuple);
        self.tuples.lock().push(tuple);
    }

    fn label(&self) -> String {
        "Buffered".into()
    }

    fn node_id(&self) -> Option<PlanNodeId> {
        Some(self.id)
    }

    fn receive_parents(&self, parents: Vec<PlanNodeId>) {
        let mut known = self.parents.lock();
        for parent in parents {
            if !known.contains(&parent) {
                known.push(parent);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple;

    #[test]
    fn test_buffers_in_push_order() {
        let sink = BufferedSink::new();
        assert!(sink.is_empty());
        sink.accept(tuple![2i64]);
        sink.accept(tuple![1i64]);
        assert_eq!(sink.tuples(), vec![tuple![2i64], tuple![1i64]]);
        assert_eq!(sink.drain().len(), 2);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_receive_parents_dedupes() {
        let sink = BufferedSink::new();
        let parent = PlanNodeId::new();
        sink.receive_parents(vec![parent]);
        sink.receive_parents(vec![parent]);
        assert_eq!(sink.parents(), vec![parent]);
        assert_eq!(sink.node_id(), Some(sink.id()));
    }
}
