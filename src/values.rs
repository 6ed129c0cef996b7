//! Route value storage for matched requests.

use serde_json::Value;
use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum number of route values before heap allocation.
/// Most REST APIs have few path parameters per route (e.g.,
/// `/users/{id}/posts/{postId}`).
pub const MAX_INLINE_VALUES: usize = 8;

/// Per-request map of parameter name to extracted or defaulted value.
///
/// Uses `SmallVec` instead of `HashMap` to avoid heap allocation in the
/// common case.
///
/// Names use `Arc<str>` because they come from the static route tree (known
/// at startup); `Arc::clone()` is O(1) versus an O(n) string copy. Values are
/// per-request data: captures are strings sliced out of the request path,
/// defaults may be any JSON value carried over from the route pattern.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteValues {
    entries: SmallVec<[(Arc<str>, Value); MAX_INLINE_VALUES]>,
}

impl RouteValues {
    /// Create an empty value map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty value map with room for `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: SmallVec::with_capacity(capacity),
        }
    }

    /// Number of values present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get a value by parameter name.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v)
    }

    /// Get a value by parameter name as a string slice, if it is a string.
    #[inline]
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Insert or replace a value.
    pub fn set(&mut self, name: Arc<str>, value: Value) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Remove a value by name, returning it if present.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k.as_ref() == name)?;
        Some(self.entries.remove(index).1)
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_ref(), v))
    }
}

impl FromIterator<(Arc<str>, Value)> for RouteValues {
    fn from_iter<I: IntoIterator<Item = (Arc<str>, Value)>>(iter: I) -> Self {
        let mut values = RouteValues::new();
        for (name, value) in iter {
            values.set(name, value);
        }
        values
    }
}
