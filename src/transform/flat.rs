//! Flat path views of nested JSON objects
//!
//! A flat path addresses a leaf by its dot-joined keys (`readings.temp`).
//! Arrays are opaque leaves. Empty objects are kept as leaves so that a
//! flatten/unflatten round trip preserves them.

use serde_json::{Map, Value};

use super::TransformError;

/// Ordered mapping from flat path to leaf value
pub type FlatMap = Map<String, Value>;

/// Flatten a nested object into `(path, leaf)` pairs in traversal order
pub fn flatten(object: &Map<String, Value>) -> FlatMap {
    let mut acc = FlatMap::new();
    flatten_into(object, "", &mut acc);
    acc
}

fn flatten_into(object: &Map<String, Value>, prefix: &str, acc: &mut FlatMap) {
    for (key, value) in object {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            Value::Object(child) if !child.is_empty() => flatten_into(child, &path, acc),
            leaf => {
                acc.insert(path, leaf.clone());
            }
        }
    }
}

/// Rebuild a nested object from flat paths
///
/// Intermediate objects are created as needed. A later path replaces an
/// earlier value at the same key. Descending through a key that already
/// holds a non-object value is a [`TransformError::PathConflict`].
pub fn unflatten(flat: FlatMap) -> Result<Map<String, Value>, TransformError> {
    let mut root = Map::new();

    for (path, value) in flat {
        let mut current = &mut root;
        let mut levels = path.split('.').peekable();

        while let Some(level) = levels.next() {
            if levels.peek().is_none() {
                current.insert(level.to_string(), value);
                break;
            }

            let entry = current
                .entry(level)
                .or_insert_with(|| Value::Object(Map::new()));
            current = match entry {
                Value::Object(child) => child,
                _ => {
                    return Err(TransformError::PathConflict { path: path.clone() });
                }
            };
        }
    }

    Ok(root)
}
