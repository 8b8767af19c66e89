//! Variable-to-value binding sets.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tuple::Value;

/// A set of variable bindings, ordered by variable name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BindingSet {
    bindings: BTreeMap<String, Value>,
}

impl BindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding, returning the updated set.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.bindings.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Two binding sets are compatible when they agree on every shared name.
    pub fn is_compatible(&self, other: &BindingSet) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .bindings
            .iter()
            .all(|(k, v)| large.get(k).map_or(true, |w| w == v))
    }

    /// Merge two compatible binding sets, `None` if they disagree.
    pub fn merge(&self, other: &BindingSet) -> Option<BindingSet> {
        if !self.is_compatible(other) {
            return None;
        }
        let mut merged = self.clone();
        for (k, v) in &other.bindings {
            merged.bindings.entry(k.clone()).or_insert_with(|| v.clone());
        }
        Some(merged)
    }

    /// Keep only the named bindings, on top of the given context.
    pub fn project(&self, names: &[String], context: &BindingSet) -> BindingSet {
        let mut projected = context.clone();
        for name in names {
            if let Some(v) = self.get(name) {
                projected.bindings.insert(name.clone(), v.clone());
            }
        }
        projected
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for BindingSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            bindings: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl fmt::Display for BindingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.bindings.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "?{}={}", k, v)?;
        }
        write!(f, "}}")
    }
}
