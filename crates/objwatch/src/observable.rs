#![forbid(unsafe_code)]

//! Observable facade: lazy, path-driven instrumentation of an object graph.
//!
//! # Design
//!
//! An [`Observable`] holds the caller's source object, the *watch object*
//! (the source itself, or a deep copy when cloning), and a
//! [`ChangeRegistry`]. Calling [`watch`](Observable::watch) walks the watch
//! object along the path and binds every leaf slot it reaches to that path;
//! afterwards any write to those slots, whether through this facade or
//! directly through an [`ObjectRef`] handle, notifies the path's handlers
//! before the write returns.
//!
//! ```text
//! watch("b", h)          b = { name, value }
//!   resolve "b"  ──▶ object ──▶ bind b.name ◀─ path "b"
//!                            └─▶ bind b.value ◀─ path "b"
//!
//! b.name = "lily"  ──▶ snapshot "b" ──▶ store ──▶ notify "b" (new b, old b)
//! ```
//!
//! # Invariants
//!
//! 1. Arrays are never instrumented and never recursed into.
//! 2. Re-watching a path binds nothing new (slot bindings are idempotent).
//! 3. With `clone = false` the watch object *is* the source object.
//! 4. With `clone = true` the watch object shares no container with the source.

use std::fmt;

use tracing::debug;

use crate::clone::{deep_clone_object, is_atomic};
use crate::error::WatchError;
use crate::path::{Path, resolve};
use crate::registry::{ChangeRegistry, Handler, Unwatch};
use crate::slot::{Binding, Slot};
use crate::value::{ObjectRef, Value};

/// Options for [`Observable::with_options`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserveOptions {
    /// Observe a deep copy instead of the source object.
    pub clone: bool,
}

impl ObserveOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether the source object is deep-copied first.
    #[must_use]
    pub fn with_clone(mut self, clone: bool) -> Self {
        self.clone = clone;
        self
    }
}

/// Handle for watching and writing an object graph by path.
///
/// Cloning an `Observable` creates a new handle to the **same** watch object
/// and registry.
#[derive(Clone)]
pub struct Observable {
    original: ObjectRef,
    target: ObjectRef,
    registry: ChangeRegistry,
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("object", &self.target)
            .field("cloned", &!self.original.ptr_eq(&self.target))
            .field("registry", &self.registry)
            .finish()
    }
}

impl Observable {
    /// Observe `source` in place.
    #[must_use]
    pub fn new(source: &ObjectRef) -> Self {
        Self::with_options(source, ObserveOptions::default())
    }

    #[must_use]
    pub fn with_options(source: &ObjectRef, options: ObserveOptions) -> Self {
        let target = if options.clone {
            deep_clone_object(source)
        } else {
            source.clone()
        };
        debug!(clone = options.clone, keys = target.len(), "observable created");
        Self {
            original: source.clone(),
            target,
            registry: ChangeRegistry::new(),
        }
    }

    /// Observe a dynamically typed value, which must be an object.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::NotAnObject`] for any other kind of value.
    pub fn from_value(source: &Value, options: ObserveOptions) -> Result<Self, WatchError> {
        match source {
            Value::Object(object) => Ok(Self::with_options(object, options)),
            other => Err(WatchError::NotAnObject { kind: other.kind() }),
        }
    }

    /// The object passed in at construction, never a copy.
    ///
    /// Without cloning this is the watch object itself, so writes through
    /// the facade are visible here.
    #[must_use]
    pub fn original(&self) -> &ObjectRef {
        &self.original
    }

    /// The object being watched.
    #[must_use]
    pub fn object(&self) -> &ObjectRef {
        &self.target
    }

    #[must_use]
    pub fn registry(&self) -> &ChangeRegistry {
        &self.registry
    }

    /// Current value at `path`; `Undefined` if missing or the path is invalid.
    #[must_use]
    pub fn get(&self, path: &str) -> Value {
        Path::parse(path)
            .map(|p| resolve(&self.target, &p).value)
            .unwrap_or_default()
    }

    /// Write `value` at `path` on the watch object.
    ///
    /// # Errors
    ///
    /// - [`WatchError::InvalidPath`] if `path` does not parse.
    /// - [`WatchError::UnresolvedPath`] if an intermediate segment is not an
    ///   object.
    /// - [`WatchError::Handler`] if a notified handler fails.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> Result<(), WatchError> {
        let parsed = Path::parse(path)?;
        let res = resolve(&self.target, &parsed);
        if !res.complete {
            return Err(WatchError::UnresolvedPath {
                path: path.to_owned(),
                segment: res.segment,
            });
        }
        res.container.set(&res.segment, value)
    }

    /// Watch `path`, calling `handler(new, old)` on every write beneath it.
    ///
    /// Returns `None` (and changes nothing) if `path` is empty or malformed.
    ///
    /// A path that stops at a missing key adds that key, holding `undefined`,
    /// to the object where the walk stopped: watching `"x.y"` with no `x`
    /// gives the watch object an `x` key (the caller's own object when not
    /// cloning), so its `keys()` and `len()` change.
    pub fn watch(&self, path: &str, handler: Handler) -> Option<Unwatch> {
        let parsed = Path::parse(path).ok()?;
        self.observe(&parsed);
        Some(self.registry.subscribe(parsed.as_str(), handler))
    }

    fn observe(&self, path: &Path) {
        let binding = Binding::new(&self.target, path.clone(), self.registry.clone());
        Self::walk(&self.target, path, &binding);
    }

    fn walk(container: &ObjectRef, path: &Path, binding: &Binding) {
        let res = resolve(container, path);
        if !res.complete {
            // Bind the slot where the walk stopped, unless it holds an array.
            if !matches!(res.container.get(&res.segment), Some(Value::Array(_))) {
                debug!(path = %binding.path(), stopped_at = %res.segment, "path not fully resolvable");
                Self::bind(&res.container, &res.segment, binding);
            }
            return;
        }

        match &res.value {
            leaf if is_atomic(leaf) => Self::bind(&res.container, &res.segment, binding),
            Value::Object(object) => {
                for key in object.keys() {
                    Self::walk(object, &Path::single(&key), binding);
                }
            }
            // Arrays are left as plain data.
            _ => {}
        }
    }

    fn bind(container: &ObjectRef, key: &str, binding: &Binding) {
        let mut data = container.data_mut();
        let slot = data
            .slots
            .entry(key.to_owned())
            .or_insert_with(|| Slot::Plain(Value::Undefined));
        if slot.bind(binding.clone()) {
            debug!(path = %binding.path(), key, "property bound");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn fixture() -> ObjectRef {
        ObjectRef::new().with("a", 1).with(
            "b",
            ObjectRef::new().with("name", "qtx").with("value", 1),
        )
    }

    fn recorder() -> (Rc<RefCell<Vec<(Value, Value)>>>, Handler) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = Rc::clone(&log);
        let handler = Handler::new(move |new, old| {
            log_clone.borrow_mut().push((new.clone(), old.clone()));
        });
        (log, handler)
    }

    #[test]
    fn leaf_write_notifies_once_with_new_and_old() {
        let obs = Observable::new(&fixture());
        let (log, handler) = recorder();
        obs.watch("a", handler).unwrap();

        obs.set("a", 10).unwrap();
        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0.as_f64(), Some(10.0));
        assert_eq!(log[0].1.as_f64(), Some(1.0));
    }

    #[test]
    fn direct_handle_write_is_observed() {
        let source = fixture();
        let obs = Observable::new(&source);
        let (log, handler) = recorder();
        obs.watch("a", handler).unwrap();

        source.set("a", "10").unwrap();
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(obs.get("a").as_str(), Some("10"));
    }

    #[test]
    fn container_watch_reports_whole_object() {
        let obs = Observable::new(&fixture());
        let (log, handler) = recorder();
        obs.watch("b", handler).unwrap();

        obs.set("b.name", "lily").unwrap();
        let log = log.borrow();
        assert_eq!(log.len(), 1);
        let (new, old) = &log[0];
        let new = new.as_object().unwrap();
        let old = old.as_object().unwrap();
        assert_eq!(new.get("name").as_ref().and_then(Value::as_str), Some("lily"));
        assert_eq!(old.get("name").as_ref().and_then(Value::as_str), Some("qtx"));
        assert!(!new.ptr_eq(old));
    }

    #[test]
    fn rewatch_binds_once() {
        let source = fixture();
        let obs = Observable::new(&source);
        let count = Rc::new(Cell::new(0u32));
        let count_clone = Rc::clone(&count);
        let handler = Handler::new(move |_, _| count_clone.set(count_clone.get() + 1));

        let w = obs.watch("a", handler.clone()).unwrap();
        obs.watch("a", handler).unwrap();
        assert_eq!(source.bound_paths("a"), vec!["a"]);
        assert_eq!(obs.registry().handler_count("a"), 1);

        obs.set("a", 2).unwrap();
        assert_eq!(count.get(), 1);

        w.unwatch();
        obs.set("a", 3).unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn invalid_path_returns_none() {
        let source = fixture();
        let obs = Observable::new(&source);
        assert!(obs.watch("", Handler::new(|_, _| {})).is_none());
        assert!(obs.watch("a..b", Handler::new(|_, _| {})).is_none());
        assert!(!source.is_observed("a"));
        assert_eq!(obs.registry().handler_count(""), 0);
    }

    #[test]
    fn parent_then_child_share_one_cell() {
        let source = fixture();
        let obs = Observable::new(&source);
        let order = Rc::new(RefCell::new(Vec::new()));
        for p in ["b", "b.name"] {
            let order = Rc::clone(&order);
            obs.watch(p, Handler::new(move |_, _| order.borrow_mut().push(p)))
                .unwrap();
        }
        let b = source.get("b").and_then(|v| v.as_object().cloned()).unwrap();
        assert_eq!(b.bound_paths("name"), vec!["b", "b.name"]);
        assert_eq!(b.bound_paths("value"), vec!["b"]);

        obs.set("b.name", "lily").unwrap();
        assert_eq!(*order.borrow(), vec!["b", "b.name"]);
        assert_eq!(obs.get("b.name").as_str(), Some("lily"));

        order.borrow_mut().clear();
        obs.set("b.value", 5).unwrap();
        assert_eq!(*order.borrow(), vec!["b"]);
    }

    #[test]
    fn missing_leaf_is_created_and_observed() {
        let source = fixture();
        let obs = Observable::new(&source);
        let (log, handler) = recorder();
        obs.watch("b.extra", handler).unwrap();

        let b = source.get("b").and_then(|v| v.as_object().cloned()).unwrap();
        assert!(b.is_observed("extra"));
        assert!(b.get("extra").is_some_and(|v| v.is_undefined()));

        obs.set("b.extra", true).unwrap();
        let log = log.borrow();
        assert_eq!(log[0].0.as_bool(), Some(true));
        assert!(log[0].1.is_undefined());
    }

    #[test]
    fn missing_intermediate_binds_nearest_parent() {
        let source = fixture();
        let obs = Observable::new(&source);
        let (log, handler) = recorder();
        obs.watch("x.y", handler).unwrap();
        assert!(source.is_observed("x"));
        assert_eq!(source.keys(), vec!["a", "b", "x"]);
        assert!(source.get("x").is_some_and(|v| v.is_undefined()));

        obs.set("x", ObjectRef::new().with("y", 7)).unwrap();
        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0.as_f64(), Some(7.0));
        assert!(log[0].1.is_undefined());
    }

    #[test]
    fn set_through_missing_intermediate_fails() {
        let obs = Observable::new(&fixture());
        let err = obs.set("x.y", 1).unwrap_err();
        assert!(matches!(err, WatchError::UnresolvedPath { ref segment, .. } if segment == "x"));
        assert!(matches!(obs.set("", 1), Err(WatchError::InvalidPath(_))));
    }

    #[test]
    fn from_value_rejects_non_objects() {
        let err = Observable::from_value(&Value::from(3), ObserveOptions::new()).unwrap_err();
        assert!(matches!(err, WatchError::NotAnObject { kind: "number" }));
        assert!(Observable::from_value(&Value::from(fixture()), ObserveOptions::new()).is_ok());
    }

    #[test]
    fn debug_format() {
        let obs = Observable::with_options(&fixture(), ObserveOptions::new().with_clone(true));
        let dbg = format!("{obs:?}");
        assert!(dbg.contains("Observable"));
        assert!(dbg.contains("cloned: true"));
    }
}
