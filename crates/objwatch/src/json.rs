#![forbid(unsafe_code)]

//! Conversion between [`Value`] and `serde_json::Value`.
//!
//! Leaves with no JSON form follow `JSON.stringify` conventions: `undefined`
//! and callables are dropped from objects and become `null` in arrays,
//! regular expressions become `{}`, and non-finite numbers become `null`.

use serde_json::{Map, Number};

use crate::value::{ArrayRef, ObjectRef, Value};

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect::<ArrayRef>())
            }
            serde_json::Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect::<ObjectRef>(),
            ),
        }
    }
}

impl Value {
    /// JSON rendition of the current state (containers read through).
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Undefined | Self::Null | Self::Function(_) => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => Number::from_f64(*n).map_or(serde_json::Value::Null, |n| {
                // Integral values render without a fraction.
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => {
                        serde_json::Value::from(f as i64)
                    }
                    _ => serde_json::Value::Number(n),
                }
            }),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::RegExp(_) => serde_json::Value::Object(Map::new()),
            Self::Array(items) => {
                serde_json::Value::Array(items.to_vec().iter().map(Self::to_json).collect())
            }
            Self::Object(object) => serde_json::Value::Object(
                object
                    .entries()
                    .into_iter()
                    .filter(|(_, v)| !matches!(v, Self::Undefined | Self::Function(_)))
                    .map(|(k, v)| (k, v.to_json()))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Callable;
    use serde_json::json;

    #[test]
    fn from_json_builds_nested_objects() {
        let value = Value::from(json!({"a": 1, "b": {"name": "qtx", "tags": ["x", null]}}));
        let root = value.as_object().unwrap();
        assert_eq!(root.keys(), vec!["a", "b"]);
        let b = root.get("b").and_then(|v| v.as_object().cloned()).unwrap();
        assert_eq!(b.get("name").as_ref().and_then(Value::as_str), Some("qtx"));
        assert_eq!(b.get("tags").and_then(|v| v.as_array().map(ArrayRef::len)), Some(2));
    }

    #[test]
    fn to_json_matches_stringify_conventions() {
        let object = ObjectRef::new()
            .with("n", 10)
            .with("half", 0.5)
            .with("u", Value::Undefined)
            .with("f", Callable::new(|_| Value::Null))
            .with("list", ArrayRef::from_iter([Value::Undefined, Value::from(f64::NAN)]));
        assert_eq!(
            Value::from(object).to_json(),
            json!({"n": 10, "half": 0.5, "list": [null, null]})
        );
    }

    #[test]
    fn from_json_keeps_document_key_order() {
        let value = Value::from(json!({"zeta": 1, "alpha": 2, "mid": {"y": 1, "b": 2}}));
        let root = value.as_object().unwrap();
        assert_eq!(root.keys(), vec!["zeta", "alpha", "mid"]);
        let mid = root.get("mid").and_then(|v| v.as_object().cloned()).unwrap();
        assert_eq!(mid.keys(), vec!["y", "b"]);

        let keys: Vec<_> = value.to_json().as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn json_round_trip_preserves_structure() {
        let source = json!({"a": 1, "b": {"name": "qtx", "value": 1}});
        assert_eq!(Value::from(source.clone()).to_json(), source);
    }
}
