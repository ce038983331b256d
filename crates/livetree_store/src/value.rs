//! Tree operations on JSON values.
//!
//! The whole tree is one [`Value`]. `null` means absence: writing `null`
//! deletes, and an object left without children collapses to `null`.
//! Arrays are stored as objects keyed by index.

use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Brings a value into stored form: arrays become index-keyed objects,
/// `null` children are dropped and empty objects become `null`.
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Array(items) => normalize_object(
            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| (index.to_string(), item)),
        ),
        Value::Object(map) => normalize_object(map),
        scalar => scalar,
    }
}

fn normalize_object(entries: impl IntoIterator<Item = (String, Value)>) -> Value {
    let map: Map<String, Value> = entries
        .into_iter()
        .map(|(key, child)| (key, normalize(child)))
        .filter(|(_, child)| !child.is_null())
        .collect();
    if map.is_empty() {
        Value::Null
    } else {
        Value::Object(map)
    }
}

/// Returns a copy of the value stored below `root` at `segments`, or
/// `null` if nothing is there.
pub fn get_at(root: &Value, segments: &[String]) -> Value {
    let mut current = root;
    for segment in segments {
        match current.get(segment) {
            Some(child) => current = child,
            None => return Value::Null,
        }
    }
    current.clone()
}

/// Replaces the value at `segments` below `root`.
///
/// Intermediate objects are created as needed and pruned again when a
/// deletion leaves them empty. Writing below a scalar replaces it.
pub fn set_at(root: &mut Value, segments: &[String], value: Value) {
    write_normalized(root, segments, normalize(value));
}

fn write_normalized(node: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }

    if let Value::Object(map) = node {
        let mut child = map.remove(head).unwrap_or(Value::Null);
        write_normalized(&mut child, rest, value);
        if !child.is_null() {
            map.insert(head.clone(), child);
        }
        if map.is_empty() {
            *node = Value::Null;
        }
    }
}

/// Orders child keys: canonical 32-bit integer keys first, numerically,
/// then every other key lexicographically.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    match (integer_key(a), integer_key(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

fn integer_key(key: &str) -> Option<i32> {
    let parsed = key.parse::<i32>().ok()?;
    (parsed.to_string() == key).then_some(parsed)
}

/// Orders values: null, false, true, numbers, strings, then objects.
///
/// Objects compare equal to each other; callers break ties by key.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) | Value::Object(_) => 5,
    }
}
