//! Immutable flat view of a configuration document.

use std::collections::BTreeMap;

use crate::core::flatten::PATH_DELIMITER;

/// An immutable flat mapping from delimited path to string value.
///
/// Snapshots are produced fresh by each fetch or watch event and never
/// mutated in place; a cell replaces its snapshot wholesale. Equality is
/// order-independent: two snapshots are equal iff they hold identical key
/// sets with identical values.
///
/// # Examples
///
/// ```rust
/// use driftsync::core::{Snapshot, flatten};
/// use serde_json::json;
///
/// let snapshot = flatten(&json!({"server": {"port": 8080}}));
/// assert_eq!(snapshot.get("server:port"), Some("8080"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: BTreeMap<String, String>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_entries(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }

    /// Look up the value at a flat path.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    /// Number of paths in this snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot holds no paths at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(path, value)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether the path itself or anything nested under it is present.
    pub fn contains(&self, path: &str) -> bool {
        if self.entries.contains_key(path) {
            return true;
        }
        let prefix = format!("{path}{PATH_DELIMITER}");
        self.entries
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(k, _)| k.starts_with(&prefix))
    }

    /// Distinct immediate child segments under a path, in order.
    ///
    /// An empty `path` enumerates the root segments. Used by the schema
    /// projector to discover the keys of an `additionalProperties` object.
    pub fn child_segments(&self, path: &str) -> Vec<String> {
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}{PATH_DELIMITER}")
        };

        let mut segments: Vec<String> = Vec::new();
        for key in self.entries.keys() {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            let segment = rest
                .split(PATH_DELIMITER)
                .next()
                .unwrap_or(rest)
                .to_string();
            // Keys are sorted, so duplicates are always adjacent.
            if segments.last() != Some(&segment) {
                segments.push(segment);
            }
        }
        segments
    }
}

impl FromIterator<(String, String)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pairs: &[(&str, &str)]) -> Snapshot {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_equality_is_order_independent() {
        let a = snapshot(&[("a", "1"), ("b", "2")]);
        let b = snapshot(&[("b", "2"), ("a", "1")]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_inequality_on_missing_key_either_side() {
        let a = snapshot(&[("a", "1"), ("b", "2")]);
        let b = snapshot(&[("a", "1")]);
        assert_ne!(a, b);
        assert_ne!(b, a);
    }

    #[test]
    fn test_inequality_on_value() {
        let a = snapshot(&[("a", "1")]);
        let b = snapshot(&[("a", "2")]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_contains_exact_and_nested() {
        let s = snapshot(&[("server:port", "8080"), ("flag", "true")]);
        assert!(s.contains("flag"));
        assert!(s.contains("server"));
        assert!(s.contains("server:port"));
        assert!(!s.contains("serv"));
        assert!(!s.contains("server:host"));
    }

    #[test]
    fn test_child_segments_at_root() {
        let s = snapshot(&[("a:x", "1"), ("a:y", "2"), ("b", "3")]);
        assert_eq!(s.child_segments(""), vec!["a", "b"]);
    }

    #[test]
    fn test_child_segments_nested() {
        let s = snapshot(&[
            ("rates:EUR:Name", "Euro"),
            ("rates:USD:Name", "US Dollar"),
            ("rates:USD:Symbol", "$"),
        ]);
        assert_eq!(s.child_segments("rates"), vec!["EUR", "USD"]);
        assert_eq!(s.child_segments("rates:USD"), vec!["Name", "Symbol"]);
        assert!(s.child_segments("rates:GBP").is_empty());
    }
}
