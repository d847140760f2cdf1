//! Operator semantics over `serde_json::Value`.
//!
//! Templates are written against loosely typed data, so the operators follow
//! the usual scripting rules: `+` concatenates when either side is a string,
//! arithmetic coerces through [`to_number`], and `&&`/`||` yield an operand
//! rather than a boolean.

use serde_json::{Map, Number, Value};

use crate::ast::{BinaryOp, UnaryOp};

/// Builds a number value, keeping integral values as integers.
pub fn number(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse().unwrap_or(f64::NAN)
            }
        }
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// String form used when a value lands in text or an attribute.
/// `null` renders as the empty string.
pub fn to_display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parses a JSON literal emitted by the source generator.
pub fn parse_literal(json: &str) -> Value {
    serde_json::from_str(json).unwrap_or(Value::Null)
}

/// Property access: object keys, array indices and `length`.
pub fn member(value: &Value, key: &Value) -> Value {
    let key = to_display(key);
    match value {
        Value::Object(map) => map.get(&key).cloned().unwrap_or(Value::Null),
        Value::Array(items) => {
            if key == "length" {
                return Value::from(items.len());
            }
            key.parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Value::Null)
        }
        Value::String(s) if key == "length" => Value::from(s.chars().count()),
        _ => Value::Null,
    }
}

/// Follows a dotted keypath through nested values.
pub fn get_path(value: &Value, keypath: &str) -> Option<Value> {
    if keypath.is_empty() {
        return Some(value.clone());
    }
    let mut current = value;
    let mut segments = keypath.split('.').peekable();
    while let Some(segment) = segments.next() {
        let last = segments.peek().is_none();
        match current {
            Value::Object(map) => current = map.get(segment)?,
            Value::Array(items) if segment == "length" => {
                return last.then(|| Value::from(items.len()));
            }
            Value::Array(items) => current = items.get(segment.parse::<usize>().ok()?)?,
            Value::String(s) if segment == "length" => {
                return last.then(|| Value::from(s.chars().count()));
            }
            _ => return None,
        }
    }
    Some(current.clone())
}

pub fn unary(op: UnaryOp, value: &Value) -> Value {
    match op {
        UnaryOp::Not => Value::Bool(!is_truthy(value)),
        UnaryOp::Minus => number(-to_number(value)),
        UnaryOp::Plus => number(to_number(value)),
    }
}

pub fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (a, b) => a == b,
    }
}

pub fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(_), Value::String(_)) => left == right,
        (Value::Number(_) | Value::Bool(_) | Value::String(_), Value::Number(_) | Value::Bool(_) | Value::String(_)) => {
            to_number(left) == to_number(right)
        }
        _ => strict_equals(left, right),
    }
}

fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => to_number(left).partial_cmp(&to_number(right)),
    }
}

/// Evaluates a non short-circuiting binary operator.
/// `&&` and `||` are handled here too, for callers that already hold both sides.
pub fn binary(op: BinaryOp, left: Value, right: Value) -> Value {
    use std::cmp::Ordering::*;
    match op {
        BinaryOp::Or => {
            if is_truthy(&left) {
                left
            } else {
                right
            }
        }
        BinaryOp::And => {
            if is_truthy(&left) {
                right
            } else {
                left
            }
        }
        BinaryOp::Equal => Value::Bool(loose_equals(&left, &right)),
        BinaryOp::NotEqual => Value::Bool(!loose_equals(&left, &right)),
        BinaryOp::StrictEqual => Value::Bool(strict_equals(&left, &right)),
        BinaryOp::StrictNotEqual => Value::Bool(!strict_equals(&left, &right)),
        BinaryOp::Less => Value::Bool(compare(&left, &right) == Some(Less)),
        BinaryOp::LessEqual => Value::Bool(matches!(compare(&left, &right), Some(Less | Equal))),
        BinaryOp::Greater => Value::Bool(compare(&left, &right) == Some(Greater)),
        BinaryOp::GreaterEqual => {
            Value::Bool(matches!(compare(&left, &right), Some(Greater | Equal)))
        }
        BinaryOp::Add => match (&left, &right) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Value::String(to_display(&left) + &to_display(&right))
            }
            _ => number(to_number(&left) + to_number(&right)),
        },
        BinaryOp::Sub => number(to_number(&left) - to_number(&right)),
        BinaryOp::Mul => number(to_number(&left) * to_number(&right)),
        BinaryOp::Div => number(to_number(&left) / to_number(&right)),
        BinaryOp::Rem => number(to_number(&left) % to_number(&right)),
    }
}

/// Builds an object value from parallel key and value lists.
pub fn object(keys: &[String], values: Vec<Value>) -> Value {
    let mut map = Map::new();
    for (key, value) in keys.iter().zip(values) {
        map.insert(key.clone(), value);
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integral_numbers_stay_integers() {
        assert_eq!(number(3.0), json!(3));
        assert_eq!(to_display(&number(1.5)), "1.5");
        assert_eq!(number(f64::NAN), Value::Null);
    }

    #[test]
    fn add_concatenates_strings() {
        assert_eq!(binary(BinaryOp::Add, json!("a"), json!(1)), json!("a1"));
        assert_eq!(binary(BinaryOp::Add, json!(1), json!(2)), json!(3));
    }

    #[test]
    fn get_path_walks_arrays_and_objects() {
        let data = json!({ "list": [{ "name": "a" }, { "name": "b" }] });
        assert_eq!(get_path(&data, "list.1.name"), Some(json!("b")));
        assert_eq!(get_path(&data, "list.length"), Some(json!(2)));
        assert_eq!(get_path(&data, "list.5"), None);
    }
}
