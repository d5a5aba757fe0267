//! Record plumbing — field maps, value comparison, key extraction.
//!
//! Records are JSON objects throughout: the connector speaks JSON, diffs are
//! JSON, and field-level comparison is comparison of serialized values.

use serde_json::{Map, Value};

/// A record (or a partial record) as a field→value map.
pub type FieldMap = Map<String, Value>;

/// Compare two optional field values the way the diff does: a field is
/// unchanged iff it is present on both sides with equal values, or absent
/// on both sides. Absent and `null` are distinct.
pub fn values_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Render a field value as a record key string.
/// Strings are used as-is; numbers and booleans are stringified.
/// Composite values don't make usable keys and yield None.
pub fn key_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Overlay `updates` on top of `base`, producing the candidate post-mutation
/// record for an edit.
pub fn overlay(base: &FieldMap, updates: &FieldMap) -> FieldMap {
    let mut merged = base.clone();
    for (k, v) in updates {
        merged.insert(k.clone(), v.clone());
    }
    merged
}
