//! Sort-merge joins.
//!
//! Both children must be sorted ascending by key (slot 0) and the left child
//! must be unique by key. The right child may repeat keys. Keys are compared
//! by identity first, then by value.
//!
//! One pending tuple is kept per side. Equal keys emit and advance the right
//! side only; otherwise the side with the smaller key advances, and its tuple
//! is settled (emitted, discarded or dropped) according to the join kind.
//! Once one side is exhausted the other side is drained into its sink, or
//! abandoned when there is no sink and nothing left to emit.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use super::error::ExecuteResult;
use super::iteration::{close_all, pull, BoxedIter, Operator};
use super::sink::DiscardSink;
use crate::tuple::Tuple;

/// Join kinds sharing the merge logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    /// Matching pairs only.
    Inner,
    /// Every left tuple; unmatched ones are emitted alone.
    LeftOuter,
    /// Left tuples with no matching right key.
    Anti,
}

impl JoinKind {
    pub fn name(&self) -> &'static str {
        match self {
            JoinKind::Inner => "inner join",
            JoinKind::LeftOuter => "left outer join",
            JoinKind::Anti => "anti join",
        }
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinKind::Inner => write!(f, "InnerJoin"),
            JoinKind::LeftOuter => write!(f, "LeftOuterJoin"),
            JoinKind::Anti => write!(f, "AntiJoin"),
        }
    }
}

/// Merge join over two sorted children.
pub struct JoinOp<'a> {
    kind: JoinKind,
    left: BoxedIter<'a>,
    right: BoxedIter<'a>,
    discarded_left: Option<&'a Arc<dyn DiscardSink>>,
    discarded_right: Option<&'a Arc<dyn DiscardSink>>,
    pending_left: Option<Tuple>,
    /// Whether `pending_left` has met a right tuple with its key.
    left_matched: bool,
    pending_right: Option<Tuple>,
    right_done: bool,
    finished: bool,
}

impl<'a> JoinOp<'a> {
    pub fn new(
        kind: JoinKind,
        left: BoxedIter<'a>,
        right: BoxedIter<'a>,
        discarded_left: Option<&'a Arc<dyn DiscardSink>>,
        discarded_right: Option<&'a Arc<dyn DiscardSink>>,
    ) -> Self {
        Self {
            kind,
            left,
            right,
            discarded_left,
            discarded_right,
            pending_left: None,
            left_matched: false,
            pending_right: None,
            right_done: false,
            finished: false,
        }
    }

    fn discard_left(&self, tuple: Tuple) {
        if let Some(sink) = self.discarded_left {
            trace!("{} discarded left {}", self.kind.name(), tuple);
            sink.accept(tuple);
        }
    }

    fn discard_right(&self, tuple: Tuple) {
        if let Some(sink) = self.discarded_right {
            trace!("{} discarded right {}", self.kind.name(), tuple);
            sink.accept(tuple);
        }
    }

    /// Decide the fate of a left tuple the merge has moved past.
    fn settle(&self, left: Tuple) -> Option<Tuple> {
        match self.kind {
            JoinKind::Inner => {
                if !self.left_matched {
                    self.discard_left(left);
                }
                None
            }
            JoinKind::LeftOuter => (!self.left_matched).then_some(left),
            JoinKind::Anti => {
                if self.left_matched {
                    self.discard_left(left);
                    None
                } else {
                    Some(left)
                }
            }
        }
    }

    /// Push the rest of the right side into its sink.
    fn drain_right(&mut self) -> ExecuteResult<()> {
        if self.discarded_right.is_none() {
            return Ok(());
        }
        if let Some(right) = self.pending_right.take() {
            self.discard_right(right);
        }
        while !self.right_done {
            match pull(&mut self.right)? {
                Some(right) => self.discard_right(right),
                None => self.right_done = true,
            }
        }
        Ok(())
    }
}

impl Operator for JoinOp<'_> {
    fn next_tuple(&mut self) -> ExecuteResult<Option<Tuple>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let left = match self.pending_left.take() {
                Some(left) => left,
                None => match pull(&mut self.left)? {
                    Some(left) => {
                        self.left_matched = false;
                        left
                    }
                    None => {
                        self.drain_right()?;
                        self.finished = true;
                        return Ok(None);
                    }
                },
            };

            if self.pending_right.is_none() && !self.right_done {
                match pull(&mut self.right) {
                    Ok(right) => {
                        self.right_done = right.is_none();
                        self.pending_right = right;
                    }
                    Err(e) => {
                        self.pending_left = Some(left);
                        return Err(e);
                    }
                }
            }

            let Some(right) = self.pending_right.take() else {
                // Right side exhausted: nothing more can match
                if self.kind == JoinKind::Inner && self.discarded_left.is_none() {
                    self.finished = true;
                    return Ok(None);
                }
                if let Some(out) = self.settle(left) {
                    return Ok(Some(out));
                }
                continue;
            };

            if left.same_key(&right) {
                self.left_matched = true;
                let out = match self.kind {
                    JoinKind::Inner | JoinKind::LeftOuter => Some(left.join(&right)),
                    JoinKind::Anti => None,
                };
                self.pending_left = Some(left);
                if out.is_some() {
                    return Ok(out);
                }
            } else if left.compare_key(&right) == Ordering::Less {
                self.pending_right = Some(right);
                if let Some(out) = self.settle(left) {
                    return Ok(Some(out));
                }
            } else {
                self.pending_left = Some(left);
                self.discard_right(right);
            }
        }
    }

    fn close(&mut self) -> ExecuteResult<()> {
        self.pending_left = None;
        self.pending_right = None;
        self.finished = true;
        close_all(&mut [&mut self.left, &mut self.right])
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::executor::iteration::testing::{counting_scan, explicit_close_scan, failing_scan, CountingIter};
    use crate::executor::iteration::{Iteration, TupleList};
    use crate::executor::{BufferedSink, ExecuteError, PlanNode, TupleIter};
    use crate::tuple;

    fn values(tuples: Vec<Tuple>) -> PlanNode {
        PlanNode::values(tuples)
    }

    fn sink(buffer: &Arc<BufferedSink>) -> Option<Arc<dyn DiscardSink>> {
        Some(buffer.clone())
    }

    fn join_with_buffers(
        kind: JoinKind,
        left: Vec<Tuple>,
        right: Vec<Tuple>,
    ) -> (Vec<Tuple>, Vec<Tuple>, Vec<Tuple>) {
        let left_sink = Arc::new(BufferedSink::new());
        let right_sink = Arc::new(BufferedSink::new());
        let plan = PlanNode::join_with_sinks(
            kind,
            values(left),
            values(right),
            sink(&left_sink),
            sink(&right_sink),
        );
        let out = plan.collect().unwrap();
        (out, left_sink.tuples(), right_sink.tuples())
    }

    #[test]
    fn test_inner_join_with_right_duplicates() {
        let (out, discarded_left, discarded_right) = join_with_buffers(
            JoinKind::Inner,
            vec![tuple![1i64, "a"]],
            vec![tuple![1i64, "x"], tuple![1i64, "y"], tuple![2i64, "z"]],
        );
        assert_eq!(out, vec![tuple![1i64, "a", "x"], tuple![1i64, "a", "y"]]);
        assert!(discarded_left.is_empty());
        assert_eq!(discarded_right, vec![tuple![2i64, "z"]]);
    }

    #[test]
    fn test_inner_join_interleaved_keys() {
        let (out, discarded_left, discarded_right) = join_with_buffers(
            JoinKind::Inner,
            vec![tuple![1i64, "a"], tuple![3i64, "c"], tuple![5i64, "e"]],
            vec![tuple![2i64, "x"], tuple![3i64, "y"], tuple![4i64, "z"], tuple![5i64, "w"]],
        );
        assert_eq!(out, vec![tuple![3i64, "c", "y"], tuple![5i64, "e", "w"]]);
        assert_eq!(discarded_left, vec![tuple![1i64, "a"]]);
        assert_eq!(discarded_right, vec![tuple![2i64, "x"], tuple![4i64, "z"]]);
    }

    #[test]
    fn test_empty_left_drains_right() {
        let (out, _, discarded_right) = join_with_buffers(
            JoinKind::Inner,
            vec![],
            vec![tuple![1i64], tuple![2i64]],
        );
        assert!(out.is_empty());
        assert_eq!(discarded_right, vec![tuple![1i64], tuple![2i64]]);
    }

    #[test]
    fn test_right_exhaustion_drains_left() {
        let (out, discarded_left, discarded_right) = join_with_buffers(
            JoinKind::Inner,
            vec![tuple![1i64, "a"], tuple![2i64, "b"], tuple![3i64, "c"]],
            vec![tuple![1i64, "x"]],
        );
        assert_eq!(out, vec![tuple![1i64, "a", "x"]]);
        assert_eq!(discarded_left, vec![tuple![2i64, "b"], tuple![3i64, "c"]]);
        assert!(discarded_right.is_empty());
    }

    #[test]
    fn test_empty_right_without_sink_stops() {
        let (left, left_closes) = counting_scan(vec![tuple![1i64], tuple![2i64]]);
        let plan = PlanNode::join(left, values(vec![]));
        assert!(plan.collect().unwrap().is_empty());
        assert_eq!(left_closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_left_outer_join() {
        let (out, discarded_left, discarded_right) = join_with_buffers(
            JoinKind::LeftOuter,
            vec![tuple![1i64, "a"], tuple![2i64, "b"], tuple![4i64, "d"]],
            vec![tuple![2i64, "x"], tuple![2i64, "y"], tuple![3i64, "z"]],
        );
        assert_eq!(
            out,
            vec![
                tuple![1i64, "a"],
                tuple![2i64, "b", "x"],
                tuple![2i64, "b", "y"],
                tuple![4i64, "d"],
            ]
        );
        assert!(discarded_left.is_empty());
        assert_eq!(discarded_right, vec![tuple![3i64, "z"]]);
    }

    #[test]
    fn test_anti_join() {
        let (out, discarded_left, discarded_right) = join_with_buffers(
            JoinKind::Anti,
            vec![tuple![1i64, "a"], tuple![2i64, "b"], tuple![3i64, "c"]],
            vec![tuple![2i64, "x"], tuple![2i64, "y"], tuple![5i64, "z"]],
        );
        assert_eq!(out, vec![tuple![1i64, "a"], tuple![3i64, "c"]]);
        assert_eq!(discarded_left, vec![tuple![2i64, "b"]]);
        assert_eq!(discarded_right, vec![tuple![5i64, "z"]]);
    }

    #[test]
    fn test_identity_or_equality_keys() {
        let shared = Arc::new(crate::tuple::Value::string("k"));
        let left = Tuple::new(vec![Some(shared.clone()), None]);
        let right_same = Tuple::new(vec![Some(shared), Some(Arc::new(1i64.into()))]);
        let right_equal = tuple!["k", 2i64];
        let plan = PlanNode::join(values(vec![left]), values(vec![right_same, right_equal]));
        assert_eq!(plan.collect().unwrap().len(), 2);
    }

    #[test]
    fn test_close_before_exhaustion() {
        let (left, left_closes) = counting_scan(vec![tuple![1i64], tuple![2i64]]);
        let (right, right_closes) = counting_scan(vec![tuple![1i64], tuple![2i64]]);
        let plan = PlanNode::join(left, right);
        let mut iter = plan.open().unwrap();
        assert!(iter.next().is_some());
        iter.close().unwrap();
        iter.close().unwrap();
        assert!(iter.next().is_none());
        drop(iter);
        assert_eq!(left_closes.load(Ordering::SeqCst), 1);
        assert_eq!(right_closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_after_exhaustion() {
        let (left, left_closes) = counting_scan(vec![tuple![1i64]]);
        let (right, right_closes) = counting_scan(vec![tuple![1i64], tuple![3i64]]);
        let plan = PlanNode::join(left, right);
        let mut iter = plan.open().unwrap();
        assert_eq!(iter.by_ref().count(), 1);
        assert_eq!(left_closes.load(Ordering::SeqCst), 1);
        iter.close().unwrap();
        drop(iter);
        assert_eq!(left_closes.load(Ordering::SeqCst), 1);
        assert_eq!(right_closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_closes_children() {
        let (left, left_closes) = counting_scan(vec![tuple![1i64]]);
        let (right, right_closes) = counting_scan(vec![tuple![1i64]]);
        let plan = PlanNode::join(PlanNode::sort(left), right);
        drop(plan.open().unwrap());
        assert_eq!(left_closes.load(Ordering::SeqCst), 1);
        assert_eq!(right_closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_failure_closes_both_sides() {
        let closes = Arc::new(AtomicUsize::new(0));
        let left: BoxedIter = Box::new(CountingIter::new(vec![], closes.clone()).failing());
        let right: BoxedIter = Box::new(CountingIter::new(vec![], closes.clone()));
        let mut join = Iteration::new("inner join", JoinOp::new(JoinKind::Inner, left, right, None, None));
        assert!(matches!(join.close(), Err(ExecuteError::CloseFailed(_))));
        assert_eq!(closes.load(Ordering::SeqCst), 2);
        drop(join);
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_right_open_failure_closes_left() {
        let (left, left_closes) = explicit_close_scan(vec![tuple![1i64]]);
        let plan = PlanNode::join(left, failing_scan());
        assert!(matches!(plan.open(), Err(ExecuteError::Source(_))));
        assert_eq!(left_closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_right_failure_keeps_pending_left() {
        let left: BoxedIter = Iteration::boxed("values", TupleList::new(vec![tuple![1i64, "a"]]));
        let right: BoxedIter = Box::new(FlakyIter {
            tuples: vec![tuple![1i64, "x"], tuple![1i64, "y"]].into_iter(),
            fail_at: 1,
            pulled: 0,
        });
        let mut join = Iteration::new("inner join", JoinOp::new(JoinKind::Inner, left, right, None, None));
        assert_eq!(join.next().unwrap().unwrap(), tuple![1i64, "a", "x"]);
        assert!(matches!(join.next(), Some(Err(ExecuteError::Source(_)))));
        assert_eq!(join.next().unwrap().unwrap(), tuple![1i64, "a", "y"]);
        assert!(join.next().is_none());
    }

    /// Fails once on the pull with index `fail_at`, then carries on.
    struct FlakyIter {
        tuples: std::vec::IntoIter<Tuple>,
        fail_at: usize,
        pulled: usize,
    }

    impl Iterator for FlakyIter {
        type Item = ExecuteResult<Tuple>;

        fn next(&mut self) -> Option<Self::Item> {
            let index = self.pulled;
            self.pulled += 1;
            if index == self.fail_at {
                return Some(Err(ExecuteError::Source("transient".into())));
            }
            self.tuples.next().map(Ok)
        }
    }

    impl TupleIter for FlakyIter {
        fn close(&mut self) -> ExecuteResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(JoinKind::Inner.name(), "inner join");
        assert_eq!(JoinKind::Anti.to_string(), "AntiJoin");
        let plan = PlanNode::left_outer_join(values(vec![]), values(vec![]));
        assert_eq!(plan.label(), "LeftOuterJoin");
    }
}
