//! Volcano-style operators.
//!
//! Each operator pulls tuples from its children one at a time. Children are
//! closed through [`Operator::close`], which the wrapping
//! [`Iteration`](super::Iteration) calls exactly once.

use std::sync::Arc;

use tracing::trace;

use super::error::{ExecuteError, ExecuteResult};
use super::iteration::{close_all, pull, BoxedIter, Operator};
use super::node::TupleCondition;
use super::sink::DiscardSink;
use crate::tuple::Tuple;

/// Filter operator - keeps tuples satisfying a condition.
pub struct FilterOp<'a> {
    child: BoxedIter<'a>,
    condition: &'a TupleCondition,
    discarded: Option<&'a Arc<dyn DiscardSink>>,
}

impl<'a> FilterOp<'a> {
    pub fn new(
        child: BoxedIter<'a>,
        condition: &'a TupleCondition,
        discarded: Option<&'a Arc<dyn DiscardSink>>,
    ) -> Self {
        Self {
            child,
            condition,
            discarded,
        }
    }
}

impl Operator for FilterOp<'_> {
    fn next_tuple(&mut self) -> ExecuteResult<Option<Tuple>> {
        while let Some(tuple) = pull(&mut self.child)? {
            if self.condition.evaluate(&tuple)? {
                return Ok(Some(tuple));
            }
            // Tuple doesn't match; hand it to the sink
            if let Some(sink) = self.discarded {
                trace!("filter discarded {}", tuple);
                sink.accept(tuple);
            }
        }
        Ok(None)
    }

    fn close(&mut self) -> ExecuteResult<()> {
        self.child.close()
    }
}

/// Project operator - keeps the listed slots.
pub struct ProjectOp<'a> {
    child: BoxedIter<'a>,
    slots: &'a [usize],
}

impl<'a> ProjectOp<'a> {
    pub fn new(child: BoxedIter<'a>, slots: &'a [usize]) -> Self {
        Self { child, slots }
    }
}

impl Operator for ProjectOp<'_> {
    fn next_tuple(&mut self) -> ExecuteResult<Option<Tuple>> {
        Ok(pull(&mut self.child)?.map(|tuple| tuple.project(self.slots)))
    }

    fn close(&mut self) -> ExecuteResult<()> {
        self.child.close()
    }
}

/// Sort operator - materializes its input and replays it in tuple order.
pub struct SortOp<'a> {
    child: BoxedIter<'a>,
    buffer_limit: usize,
    sorted: Option<std::vec::IntoIter<Tuple>>,
}

impl<'a> SortOp<'a> {
    pub fn new(child: BoxedIter<'a>, buffer_limit: usize) -> Self {
        Self {
            child,
            buffer_limit,
            sorted: None,
        }
    }

    fn materialize(&mut self) -> ExecuteResult<()> {
        if self.sorted.is_some() {
            return Ok(());
        }

        let mut tuples = Vec::new();
        while let Some(tuple) = pull(&mut self.child)? {
            if tuples.len() >= self.buffer_limit {
                return Err(ExecuteError::ResourceLimit(format!(
                    "sort buffer holds at most {} tuples",
                    self.buffer_limit
                )));
            }
            tuples.push(tuple);
        }

        tuples.sort();
        self.sorted = Some(tuples.into_iter());
        Ok(())
    }
}

impl Operator for SortOp<'_> {
    fn next_tuple(&mut self) -> ExecuteResult<Option<Tuple>> {
        self.materialize()?;
        Ok(self.sorted.as_mut().and_then(Iterator::next))
    }

    fn close(&mut self) -> ExecuteResult<()> {
        self.sorted = None;
        self.child.close()
    }
}

/// Limit operator - skips `offset` tuples and stops after `limit`.
///
/// Returning `None` at the limit closes the child right away, without pulling
/// further tuples.
pub struct LimitOp<'a> {
    child: BoxedIter<'a>,
    offset: usize,
    limit: Option<usize>,
    skipped: usize,
    emitted: usize,
}

impl<'a> LimitOp<'a> {
    pub fn new(child: BoxedIter<'a>, offset: usize, limit: Option<usize>) -> Self {
        Self {
            child,
            offset,
            limit,
            skipped: 0,
            emitted: 0,
        }
    }
}

impl Operator for LimitOp<'_> {
    fn next_tuple(&mut self) -> ExecuteResult<Option<Tuple>> {
        if self.limit.is_some_and(|limit| self.emitted >= limit) {
            return Ok(None);
        }

        // Skip offset tuples
        while self.skipped < self.offset {
            if pull(&mut self.child)?.is_none() {
                return Ok(None);
            }
            self.skipped += 1;
        }

        let next = pull(&mut self.child)?;
        if next.is_some() {
            self.emitted += 1;
        }
        Ok(next)
    }

    fn close(&mut self) -> ExecuteResult<()> {
        self.child.close()
    }
}

/// Union operator - merges two sorted inputs, keeping duplicates.
pub struct UnionOp<'a> {
    left: BoxedIter<'a>,
    right: BoxedIter<'a>,
    next_left: Option<Tuple>,
    next_right: Option<Tuple>,
    primed: bool,
}

impl<'a> UnionOp<'a> {
    pub fn new(left: BoxedIter<'a>, right: BoxedIter<'a>) -> Self {
        Self {
            left,
            right,
            next_left: None,
            next_right: None,
            primed: false,
        }
    }
}

impl Operator for UnionOp<'_> {
    fn next_tuple(&mut self) -> ExecuteResult<Option<Tuple>> {
        if !self.primed {
            self.next_left = pull(&mut self.left)?;
            self.next_right = pull(&mut self.right)?;
            self.primed = true;
        }

        let take_left = match (&self.next_left, &self.next_right) {
            (None, None) => return Ok(None),
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (Some(l), Some(r)) => l <= r,
        };

        if take_left {
            let tuple = self.next_left.take();
            self.next_left = pull(&mut self.left)?;
            Ok(tuple)
        } else {
            let tuple = self.next_right.take();
            self.next_right = pull(&mut self.right)?;
            Ok(tuple)
        }
    }

    fn close(&mut self) -> ExecuteResult<()> {
        close_all(&mut [&mut self.left, &mut self.right])
    }
}

/// Unique operator - drops consecutive duplicates.
pub struct UniqueOp<'a> {
    child: BoxedIter<'a>,
    previous: Option<Tuple>,
}

impl<'a> UniqueOp<'a> {
    pub fn new(child: BoxedIter<'a>) -> Self {
        Self {
            child,
            previous: None,
        }
    }
}

impl Operator for UniqueOp<'_> {
    fn next_tuple(&mut self) -> ExecuteResult<Option<Tuple>> {
        while let Some(tuple) = pull(&mut self.child)? {
            if self.previous.as_ref() != Some(&tuple) {
                self.previous = Some(tuple.clone());
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn close(&mut self) -> ExecuteResult<()> {
        self.child.close()
    }
}
