//! Dot-path lookup and injection over JSON documents.
//!
//! A path such as `"meta.seo.description"` addresses nested object keys.
//! Lookups treat numeric segments as array indexes when the current value is
//! an array. Missing intermediate keys yield `None`; they are never an error.

use serde_json::{Map, Value};

/// Split a dot path into its segments.
///
/// Returns `None` for empty paths or paths with empty segments (`"a..b"`).
pub fn segments(path: &str) -> Option<Vec<&str>> {
    if path.is_empty() {
        return None;
    }

    let parts: Vec<&str> = path.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return None;
    }

    Some(parts)
}

/// Look up the value at `path`.
///
/// # Examples
///
/// ```rust
/// use cms_bridge_core::transform::path::get_path;
/// use serde_json::json;
///
/// let doc = json!({"a": {"b": {"c": 42}}, "tags": ["x", "y"]});
///
/// assert_eq!(get_path(&doc, "a.b.c"), Some(&json!(42)));
/// assert_eq!(get_path(&doc, "tags.1"), Some(&json!("y")));
/// assert_eq!(get_path(&doc, "a.missing.c"), None);
/// ```
pub fn get_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = document;

    for segment in segments(path)? {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Write `value` at `path`, creating intermediate objects as needed.
///
/// Any non-object value sitting on the way to the target is replaced by an
/// object. Invalid paths are ignored and reported by returning `false`.
pub fn set_path(document: &mut Value, path: &str, value: Value) -> bool {
    let Some(parts) = segments(path) else {
        return false;
    };

    let (last, parents) = match parts.split_last() {
        Some(split) => split,
        None => return false,
    };

    let mut current = document;
    for segment in parents {
        let map = ensure_object(current);
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    ensure_object(current).insert(last.to_string(), value);
    true
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }

    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced by an object"),
    }
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;
