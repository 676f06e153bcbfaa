//! Flattening codec: nested documents to flat path/value snapshots.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::core::Snapshot;

/// Delimiter between path segments in a flat snapshot.
pub const PATH_DELIMITER: char = ':';

/// Join a parent path and a child segment.
pub fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}{PATH_DELIMITER}{segment}")
    }
}

/// Flatten a nested document into a [`Snapshot`].
///
/// Objects contribute `prefix:key` per property, arrays contribute
/// `prefix:index` per element (decimal, zero-based), scalars terminate a
/// path with their textual rendering. Numbers and booleans use their
/// locale-invariant JSON form; null renders as the empty string.
///
/// Empty objects and arrays contribute no paths, so the flat form cannot
/// distinguish an absent value from an empty container.
///
/// # Examples
///
/// ```rust
/// use driftsync::core::flatten;
/// use serde_json::json;
///
/// let snapshot = flatten(&json!({
///     "logging": {"providers": [{"name": "Console"}, {"name": "File"}]}
/// }));
/// assert_eq!(snapshot.get("logging:providers:0:name"), Some("Console"));
/// assert_eq!(snapshot.get("logging:providers:1:name"), Some("File"));
/// ```
pub fn flatten(document: &Value) -> Snapshot {
    let mut entries = BTreeMap::new();
    walk("", document, &mut entries);
    Snapshot::from_entries(entries)
}

fn walk(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                walk(&join_path(prefix, key), child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                walk(&join_path(prefix, &index.to_string()), child, out);
            }
        }
        scalar => {
            out.insert(prefix.to_string(), render_scalar(scalar));
        }
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        // walk() never passes containers here
        other => other.to_string(),
    }
}
