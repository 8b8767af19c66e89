//! Fixed-arity tuples and their ordering.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use super::value::Value;

/// A tuple slot: a shared value, or `None` for "unbound".
pub type Slot = Option<Arc<Value>>;

/// Check whether two slots denote the same value.
///
/// Identity is tried first; values may be represented by distinct instances
/// denoting the same logical value, so structural equality is the fallback.
pub fn slots_equal(a: &Slot, b: &Slot) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b) || a == b,
        _ => false,
    }
}

/// Compare two slots. Unbound sorts before any value.
pub fn compare_slots(a: &Slot, b: &Slot) -> Ordering {
    if slots_equal(a, b) {
        return Ordering::Equal;
    }
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.as_ref().cmp(b.as_ref()),
    }
}

/// An ordered sequence of nullable values.
///
/// Slot 0 is the join/sort key for sorted producers.
#[derive(Debug, Clone, Default)]
pub struct Tuple {
    slots: Vec<Slot>,
}

impl Tuple {
    pub fn new(slots: Vec<Slot>) -> Self {
        Self { slots }
    }

    /// Build a tuple where every slot is bound.
    pub fn from_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            slots: values.into_iter().map(|v| Some(Arc::new(v.into()))).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Get the value at a slot, `None` if unbound or out of range.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.slots.get(index).and_then(|s| s.as_deref())
    }

    /// The join key (slot 0).
    pub fn key(&self) -> &Slot {
        const UNBOUND: &Slot = &None;
        self.slots.first().unwrap_or(UNBOUND)
    }

    /// Check whether two tuples share a join key.
    pub fn same_key(&self, other: &Tuple) -> bool {
        slots_equal(self.key(), other.key())
    }

    /// Compare join keys.
    pub fn compare_key(&self, other: &Tuple) -> Ordering {
        compare_slots(self.key(), other.key())
    }

    /// Combine with a right-hand tuple sharing this tuple's key: all slots of
    /// `self` followed by the non-key slots of `right`.
    pub fn join(&self, right: &Tuple) -> Tuple {
        let mut slots = Vec::with_capacity(self.slots.len() + right.slots.len().saturating_sub(1));
        slots.extend(self.slots.iter().cloned());
        slots.extend(right.slots.iter().skip(1).cloned());
        Tuple { slots }
    }

    /// Keep the listed slots, in the listed order.
    pub fn project(&self, indices: &[usize]) -> Tuple {
        Tuple {
            slots: indices
                .iter()
                .map(|&i| self.slots.get(i).cloned().flatten())
                .collect(),
        }
    }
}

impl Ord for Tuple {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.slots.iter().zip(other.slots.iter()) {
            match compare_slots(a, b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.slots.len().cmp(&other.slots.len())
    }
}

impl PartialOrd for Tuple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Tuple {}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, slot) in self.slots.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match slot {
                Some(v) => write!(f, "{}", v)?,
                None => write!(f, "_")?,
            }
        }
        write!(f, ")")
    }
}

/// Build a tuple from a list of values.
///
/// ```
/// use relflow::tuple;
/// let t = tuple![1i64, "a"];
/// assert_eq!(t.len(), 2);
/// ```
#[macro_export]
macro_rules! tuple {
    ($($v:expr),* $(,)?) => {
        $crate::tuple::Tuple::new(vec![$(Some(::std::sync::Arc::new($crate::tuple::Value::from($v)))),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_fast_path() {
        let shared = Arc::new(Value::string("x"));
        let a: Slot = Some(shared.clone());
        let b: Slot = Some(shared);
        assert!(slots_equal(&a, &b));
    }

    #[test]
    fn test_distinct_instances_equal_by_value() {
        let a: Slot = Some(Arc::new(Value::Integer(5)));
        let b: Slot = Some(Arc::new(Value::Integer(5)));
        assert!(!Arc::ptr_eq(a.as_ref().unwrap(), b.as_ref().unwrap()));
        assert!(slots_equal(&a, &b));
        assert_eq!(compare_slots(&a, &b), Ordering::Equal);
    }

    #[test]
    fn test_unbound_sorts_first() {
        let t1 = Tuple::new(vec![None]);
        let t2 = crate::tuple![0i64];
        assert!(t1 < t2);
    }

    #[test]
    fn test_join_skips_right_key() {
        let left = crate::tuple![1i64, "a"];
        let right = crate::tuple![1i64, "x"];
        assert_eq!(left.join(&right), crate::tuple![1i64, "a", "x"]);
    }

    #[test]
    fn test_ordering_breaks_ties_on_later_slots() {
        assert!(crate::tuple![1i64, "a"] < crate::tuple![1i64, "b"]);
        assert!(crate::tuple![1i64] < crate::tuple![1i64, "a"]);
    }

    #[test]
    fn test_project() {
        let t = crate::tuple![1i64, "a", "b"];
        let p = t.project(&[2, 0, 9]);
        assert_eq!(p.get(0), Some(&Value::string("b")));
        assert_eq!(p.get(1), Some(&Value::Integer(1)));
        assert_eq!(p.get(2), None);
    }

    #[test]
    fn test_display() {
        let t = Tuple::new(vec![Some(Arc::new(Value::Integer(1))), None]);
        assert_eq!(t.to_string(), "(1, _)");
    }
}
