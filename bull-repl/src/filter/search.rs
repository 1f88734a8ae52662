//! Structural matching of JSON objects against a search object.
//!
//! The search object maps dotted paths to conditions:
//!
//! ```json
//! {"name": "email", "data.user.id": [1, 2], "attemptsMade": {"gte": 2}}
//! ```
//!
//! - a primitive matches by equality; if the field is an array, any element
//!   may match
//! - an array of conditions matches if any of them does
//! - an operator object (`gt`, `gte`, `lt`, `lte`, `from`, `to`, `_text`,
//!   `_start`, `_end`, `_not`) matches if every operator does
//! - any other object is matched recursively against the field
//!
//! At the top level, `"_join": "OR"` switches from all-of to any-of and
//! `"_not": true` negates the result.

use serde_json::{Map, Value};
use std::cmp::Ordering;

const OPERATORS: [&str; 10] = [
    "gt", "gte", "lt", "lte", "from", "to", "_text", "_start", "_end", "_not",
];

/// Match `target` against a search object.
#[must_use]
pub fn matches(target: &Value, search: &Map<String, Value>) -> bool {
    let any_of = search
        .get("_join")
        .and_then(Value::as_str)
        .is_some_and(|join| join.eq_ignore_ascii_case("OR"));
    let negate = search.get("_not").and_then(Value::as_bool).unwrap_or(false);

    let mut conditions = search
        .iter()
        .filter(|(key, _)| key.as_str() != "_join" && key.as_str() != "_not");

    let matched = if any_of {
        conditions.any(|(path, condition)| field_matches(lookup(target, path), condition))
    } else {
        conditions.all(|(path, condition)| field_matches(lookup(target, path), condition))
    };

    matched != negate
}

/// Resolve a dotted path. A literal key containing dots wins over traversal.
fn lookup<'a>(target: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(value) = target.get(path) {
        return Some(value);
    }
    path.split('.')
        .try_fold(target, |current, segment| current.as_object()?.get(segment))
}

fn field_matches(field: Option<&Value>, condition: &Value) -> bool {
    match condition {
        Value::Array(options) => options.iter().any(|option| field_matches(field, option)),
        Value::Object(ops) if is_operator_object(ops) => {
            ops.iter().all(|(op, operand)| operator_matches(field, op, operand))
        }
        Value::Object(nested) => match field {
            Some(value @ Value::Object(_)) => matches(value, nested),
            Some(Value::Array(items)) => items.iter().any(|item| matches(item, nested)),
            _ => false,
        },
        primitive => field.is_some_and(|value| {
            any_element(value, |v| v == primitive || numbers_equal(v, primitive))
        }),
    }
}

fn is_operator_object(ops: &Map<String, Value>) -> bool {
    !ops.is_empty() && ops.keys().all(|key| OPERATORS.contains(&key.as_str()))
}

fn operator_matches(field: Option<&Value>, op: &str, operand: &Value) -> bool {
    if op == "_not" {
        return !field_matches(field, operand);
    }
    let Some(value) = field else {
        return false;
    };
    any_element(value, |v| match op {
        "gt" => compare(v, operand) == Some(Ordering::Greater),
        "gte" | "from" => matches!(compare(v, operand), Some(Ordering::Greater | Ordering::Equal)),
        "lt" => compare(v, operand) == Some(Ordering::Less),
        "lte" | "to" => matches!(compare(v, operand), Some(Ordering::Less | Ordering::Equal)),
        "_text" => text_matches(v, operand, |haystack, needle| haystack.contains(needle)),
        "_start" => text_matches(v, operand, |haystack, needle| haystack.starts_with(needle)),
        "_end" => text_matches(v, operand, |haystack, needle| haystack.ends_with(needle)),
        _ => false,
    })
}

/// Apply `check` to the value, or to each element if it is an array.
fn any_element(value: &Value, check: impl Fn(&Value) -> bool) -> bool {
    match value {
        Value::Array(items) => items.iter().any(&check),
        other => check(other),
    }
}

fn numbers_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
        _ => false,
    }
}

fn compare(value: &Value, operand: &Value) -> Option<Ordering> {
    match (value, operand) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Case-insensitive string test.
fn text_matches(value: &Value, operand: &Value, test: impl Fn(&str, &str) -> bool) -> bool {
    let haystack = match value {
        Value::String(s) => s.to_lowercase(),
        Value::Number(n) => n.to_string(),
        _ => return false,
    };
    let needle = match operand {
        Value::String(s) => s.to_lowercase(),
        Value::Number(n) => n.to_string(),
        _ => return false,
    };
    test(&haystack, &needle)
}
