#![forbid(unsafe_code)]

//! Leaf classification and structural deep copies.
//!
//! # Invariants
//!
//! 1. `deep_clone(v)` is structurally equal to `v`.
//! 2. The copy shares no container with the source, at any depth.
//! 3. Object copies carry the source's prototype handle and plain slots only:
//!    observation state is never copied.
//!
//! Cyclic graphs are not supported and will recurse without bound.

use crate::value::{ArrayRef, ObjectRef, Value};

/// Whether `value` is a leaf that observation never recurses into.
///
/// Every falsy value is atomic, as are strings, numbers, booleans, regular
/// expressions and callables. Only arrays and objects are containers.
#[must_use]
pub fn is_atomic(value: &Value) -> bool {
    if !value.is_truthy() {
        return true;
    }
    matches!(
        value,
        Value::Undefined
            | Value::Null
            | Value::Bool(_)
            | Value::Number(_)
            | Value::String(_)
            | Value::RegExp(_)
            | Value::Function(_)
    )
}

/// Structural deep copy of `value`.
#[must_use]
pub fn deep_clone(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(deep_clone_array(items)),
        Value::Object(object) => Value::Object(deep_clone_object(object)),
        atomic => atomic.clone(),
    }
}

/// Structural deep copy of an object, keeping its prototype.
#[must_use]
pub fn deep_clone_object(source: &ObjectRef) -> ObjectRef {
    let copy: ObjectRef = source
        .entries()
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                v if is_atomic(&v) => v,
                Value::Array(items) => Value::Array(deep_clone_array(&items)),
                other => deep_clone(&other),
            };
            (key, value)
        })
        .collect();
    copy.set_prototype(source.prototype());
    copy
}

fn deep_clone_array(items: &ArrayRef) -> ArrayRef {
    items.to_vec().iter().map(deep_clone).collect()
}
