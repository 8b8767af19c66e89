//! The pull-based iteration protocol.
//!
//! An open plan node is a [`TupleIter`]: an iterator of tuples that can also
//! be closed. Closing releases the iteration and every child iteration it
//! owns. Close is idempotent and also happens on exhaustion and on drop, so an
//! abandoned iteration never leaks a child.
//!
//! Operators implement the smaller [`Operator`] trait and are wrapped in an
//! [`Iteration`], which supplies the close bookkeeping.

use tracing::{debug, warn};

use super::error::{ExecuteError, ExecuteResult};
use crate::tuple::Tuple;

/// An open, closable stream of tuples.
pub trait TupleIter: Iterator<Item = ExecuteResult<Tuple>> {
    /// Release this iteration and its children. Calling it again is a no-op.
    fn close(&mut self) -> ExecuteResult<()>;
}

/// A boxed iteration borrowing from the plan that opened it.
pub type BoxedIter<'a> = Box<dyn TupleIter + 'a>;

/// Operator state machine driven by an [`Iteration`].
pub trait Operator {
    /// Get the next tuple, or None if exhausted.
    fn next_tuple(&mut self) -> ExecuteResult<Option<Tuple>>;

    /// Close child iterations. Called at most once.
    fn close(&mut self) -> ExecuteResult<()>;
}

/// Wraps an operator with idempotent close, close on exhaustion and close on
/// drop.
pub struct Iteration<O: Operator> {
    operator: O,
    name: &'static str,
    closed: bool,
}

impl<O: Operator> Iteration<O> {
    pub fn new(name: &'static str, operator: O) -> Self {
        debug!("opened {} iteration", name);
        Self {
            operator,
            name,
            closed: false,
        }
    }

    pub fn boxed<'a>(name: &'static str, operator: O) -> BoxedIter<'a>
    where
        O: 'a,
    {
        Box::new(Self::new(name, operator))
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<O: Operator> Iterator for Iteration<O> {
    type Item = ExecuteResult<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        match self.operator.next_tuple() {
            Ok(Some(tuple)) => Some(Ok(tuple)),
            Ok(None) => TupleIter::close(self).err().map(Err),
            Err(e) => Some(Err(e)),
        }
    }
}

impl<O: Operator> TupleIter for Iteration<O> {
    fn close(&mut self) -> ExecuteResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!("closing {} iteration", self.name);
        self.operator.close()
    }
}

impl<O: Operator> Drop for Iteration<O> {
    fn drop(&mut self) {
        if let Err(e) = TupleIter::close(self) {
            warn!("failed to close {} iteration on drop: {}", self.name, e);
        }
    }
}

/// Pull one tuple from a child.
pub(crate) fn pull(child: &mut BoxedIter<'_>) -> ExecuteResult<Option<Tuple>> {
    child.next().transpose()
}

/// Close every child, even after a failure, and report the first failure.
pub(crate) fn close_all(children: &mut [&mut BoxedIter<'_>]) -> ExecuteResult<()> {
    let mut first: Option<ExecuteError> = None;
    for child in children.iter_mut() {
        if let Err(e) = child.close() {
            first.get_or_insert(e);
        }
    }
    first.map_or(Ok(()), Err)
}

/// Replays an owned list of tuples.
pub struct TupleList {
    tuples: std::vec::IntoIter<Tuple>,
}

impl TupleList {
    pub fn new(tuples: Vec<Tuple>) -> Self {
        Self {
            tuples: tuples.into_iter(),
        }
    }
}

impl Operator for TupleList {
    fn next_tuple(&mut self) -> ExecuteResult<Option<Tuple>> {
        Ok(self.tuples.next())
    }

    fn close(&mut self) -> ExecuteResult<()> {
        // drop whatever was not consumed
        self.tuples = Vec::new().into_iter();
        Ok(())
    }
}
