//! Triple sources consumed by statement patterns.

use parking_lot::RwLock;

use super::error::EvalResult;
use crate::tuple::Value;

/// A (subject, predicate, object) statement.
pub type Statement = [Value; 3];

/// Supplies statements matching a pattern. `None` positions are wildcards.
pub trait TripleSource: Send + Sync {
    fn statements(
        &self,
        subject: Option<&Value>,
        predicate: Option<&Value>,
        object: Option<&Value>,
    ) -> EvalResult<Vec<Statement>>;
}

/// A source with no statements.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyTripleSource;

impl TripleSource for EmptyTripleSource {
    fn statements(
        &self,
        _subject: Option<&Value>,
        _predicate: Option<&Value>,
        _object: Option<&Value>,
    ) -> EvalResult<Vec<Statement>> {
        Ok(Vec::new())
    }
}

/// An in-memory statement list.
#[derive(Debug, Default)]
pub struct MemoryTripleSource {
    statements: RwLock<Vec<Statement>>,
}

impl MemoryTripleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, subject: impl Into<Value>, predicate: impl Into<Value>, object: impl Into<Value>) {
        self.statements
            .write()
            .push([subject.into(), predicate.into(), object.into()]);
    }

    pub fn len(&self) -> usize {
        self.statements.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.read().is_empty()
    }
}

impl TripleSource for MemoryTripleSource {
    fn statements(
        &self,
        subject: Option<&Value>,
        predicate: Option<&Value>,
        object: Option<&Value>,
    ) -> EvalResult<Vec<Statement>> {
        let matches = |pattern: Option<&Value>, v: &Value| pattern.map_or(true, |p| p == v);
        Ok(self
            .statements
            .read()
            .iter()
            .filter(|[s, p, o]| matches(subject, s) && matches(predicate, p) && matches(object, o))
            .cloned()
            .collect())
    }
}
