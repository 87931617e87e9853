//! Typed field access over loosely structured Azure DevOps payloads.
//!
//! Every accessor absorbs absence and shape mismatches into a fixed default:
//! `""` for strings, `-1` for integers and the enum's `Default` variant for enums.

use std::str::FromStr;

use serde_json::Value;

/// Sentinel returned by [`get_int`] when a field is missing or not an integer.
pub const MISSING_INT: i64 = -1;

/// Looks up `key` on an object node.
///
/// Exact match first, then a case-insensitive scan: the service is not consistent
/// about casing (e.g. `sourcePath` vs `sourcepath` in issue data).
pub fn field<'a>(node: &'a Value, key: &str) -> Option<&'a Value> {
    let object = node.as_object()?;
    object.get(key).or_else(|| {
        object
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

/// Scalar values coerce to their textual form; arrays, objects and null do not.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn value_to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn get_string(node: &Value, key: &str) -> String {
    field(node, key)
        .and_then(scalar_to_string)
        .unwrap_or_default()
}

pub fn get_int(node: &Value, key: &str) -> i64 {
    field(node, key).and_then(value_to_int).unwrap_or(MISSING_INT)
}

/// Parses the field's string value into `E` (case-insensitive by `E`'s `FromStr`),
/// falling back to `E::default()`.
pub fn get_enum<E>(node: &Value, key: &str) -> E
where
    E: FromStr + Default,
{
    field(node, key)
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

/// Strict integer read: `Ok(None)` when absent or null, `Err` when present but
/// not an integer.
pub fn try_int(node: &Value, key: &str) -> Result<Option<i64>, String> {
    match field(node, key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value_to_int(value)
            .map(Some)
            .ok_or_else(|| format!("field '{key}' is not an integer: {value}")),
    }
}

/// Strict string read: `Ok(None)` when absent or null, `Err` for arrays and objects.
pub fn try_string(node: &Value, key: &str) -> Result<Option<String>, String> {
    match field(node, key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => scalar_to_string(value)
            .map(Some)
            .ok_or_else(|| format!("field '{key}' is not a scalar: {value}")),
    }
}

/// True when the node is an object carrying at least one non-null value.
pub fn has_values(node: &Value) -> bool {
    node.as_object()
        .is_some_and(|object| object.values().any(|v| !v.is_null()))
}

/// Returns the array under `key`, or an empty slice when absent or not an array.
pub fn get_array<'a>(node: &'a Value, key: &str) -> &'a [Value] {
    field(node, key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}
