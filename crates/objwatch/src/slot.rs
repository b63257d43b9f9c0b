#![forbid(unsafe_code)]

//! Per-property storage and the observed write path.
//!
//! # State machine
//!
//! ```text
//!   Plain(value) ──bind()──▶ Observed { value, bindings: [b1] }
//!                                  │
//!                                  └─bind(b2)─▶ Observed { value, bindings: [b1, b2] }
//! ```
//!
//! The transition is one-way. An observed slot owns exactly one value cell no
//! matter how many paths are bound to it; binding a path that is already
//! present is a no-op.
//!
//! # Write sequence
//!
//! For an observed slot, [`write`] runs *snapshot → install → notify*:
//!
//! 1. For every binding, resolve its path from the watch root and deep-copy
//!    the result (the old value).
//! 2. Store the new value in the slot.
//! 3. For every binding, resolve its path again and notify the registry with
//!    `(fresh, old)`.
//!
//! No `RefCell` borrow is held across steps 1 or 3, so handlers can read and
//! write any object reentrantly.

use tracing::trace;

use crate::clone::deep_clone;
use crate::error::WatchError;
use crate::path::{Path, resolve};
use crate::registry::ChangeRegistry;
use crate::value::{ObjectRef, Value, WeakObjectRef};

/// Storage for one object property.
pub(crate) enum Slot {
    Plain(Value),
    Observed(ObservedSlot),
}

pub(crate) struct ObservedSlot {
    value: Value,
    bindings: Vec<Binding>,
}

/// Routes writes of one slot to the handlers of one watched path.
#[derive(Clone)]
pub(crate) struct Binding {
    /// Watch root the path is resolved from. Weak: the slot lives inside it.
    root: WeakObjectRef,
    path: Path,
    registry: ChangeRegistry,
}

impl Binding {
    pub(crate) fn new(root: &ObjectRef, path: Path, registry: ChangeRegistry) -> Self {
        Self {
            root: root.downgrade(),
            path,
            registry,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    fn same_as(&self, other: &Self) -> bool {
        self.path == other.path
            && self.root.ptr_eq(&other.root)
            && self.registry.ptr_eq(&other.registry)
    }

    fn current(&self) -> Value {
        self.root
            .upgrade()
            .map(|root| resolve(&root, &self.path).value)
            .unwrap_or_default()
    }

    fn dispatch(&self, old: &Value) -> Result<(), WatchError> {
        if self.root.upgrade().is_none() {
            return Ok(());
        }
        let fresh = self.current();
        self.registry.notify(self.path.as_str(), &fresh, old)
    }
}

impl Slot {
    pub(crate) fn value(&self) -> &Value {
        match self {
            Self::Plain(value) | Self::Observed(ObservedSlot { value, .. }) => value,
        }
    }

    pub(crate) fn into_value(self) -> Value {
        match self {
            Self::Plain(value) | Self::Observed(ObservedSlot { value, .. }) => value,
        }
    }

    pub(crate) fn is_observed(&self) -> bool {
        matches!(self, Self::Observed(_))
    }

    pub(crate) fn bound_paths(&self) -> Vec<String> {
        match self {
            Self::Plain(_) => Vec::new(),
            Self::Observed(observed) => observed
                .bindings
                .iter()
                .map(|b| b.path.as_str().to_owned())
                .collect(),
        }
    }

    /// Attach `binding`, converting a plain slot on first use.
    ///
    /// Returns `false` if an identical binding was already attached.
    pub(crate) fn bind(&mut self, binding: Binding) -> bool {
        match self {
            Self::Plain(value) => {
                let value = std::mem::take(value);
                *self = Self::Observed(ObservedSlot {
                    value,
                    bindings: vec![binding],
                });
                true
            }
            Self::Observed(observed) => {
                if observed.bindings.iter().any(|b| b.same_as(&binding)) {
                    return false;
                }
                observed.bindings.push(binding);
                true
            }
        }
    }

    fn replace(&mut self, new: Value) {
        match self {
            Self::Plain(value) | Self::Observed(ObservedSlot { value, .. }) => *value = new,
        }
    }
}

/// Store `value` under `key` on `target`, notifying bound paths if observed.
pub(crate) fn write(target: &ObjectRef, key: &str, value: Value) -> Result<(), WatchError> {
    let bindings = {
        let mut data = target.data_mut();
        match data.slots.get_mut(key) {
            Some(Slot::Observed(observed)) => observed.bindings.clone(),
            Some(slot) => {
                slot.replace(value);
                return Ok(());
            }
            None => {
                data.slots.insert(key.to_owned(), Slot::Plain(value));
                return Ok(());
            }
        }
    };

    let snapshots: Vec<Value> = bindings.iter().map(|b| deep_clone(&b.current())).collect();

    if let Some(slot) = target.data_mut().slots.get_mut(key) {
        slot.replace(value);
    }

    trace!(key, bindings = bindings.len(), "observed write");
    for (binding, old) in bindings.iter().zip(&snapshots) {
        binding.dispatch(old)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Handler;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn path(raw: &str) -> Path {
        Path::parse(raw).unwrap()
    }

    #[test]
    fn plain_write_does_not_notify() {
        let root = ObjectRef::new().with("a", 1);
        let registry = ChangeRegistry::new();
        let hits = Rc::new(RefCell::new(0));
        let hits_clone = Rc::clone(&hits);
        let _w = registry.subscribe("a", Handler::new(move |_, _| *hits_clone.borrow_mut() += 1));

        root.set("a", 2).unwrap();
        assert_eq!(*hits.borrow(), 0);
    }

    #[test]
    fn bind_is_one_way_and_idempotent() {
        let root = ObjectRef::new().with("a", 1);
        let registry = ChangeRegistry::new();
        let binding = Binding::new(&root, path("a"), registry.clone());

        let mut data = root.data_mut();
        let slot = data.slots.get_mut("a").unwrap();
        assert!(slot.bind(binding.clone()));
        assert!(slot.is_observed());
        assert!(!slot.bind(binding));
        assert_eq!(slot.bound_paths(), vec!["a"]);
        assert_eq!(slot.value().as_f64(), Some(1.0));
    }

    #[test]
    fn distinct_paths_share_one_value_cell() {
        let inner = ObjectRef::new().with("name", "x");
        let root = ObjectRef::new().with("b", inner.clone());
        let registry = ChangeRegistry::new();
        {
            let mut data = inner.data_mut();
            let slot = data.slots.get_mut("name").unwrap();
            slot.bind(Binding::new(&root, path("b"), registry.clone()));
            slot.bind(Binding::new(&root, path("b.name"), registry.clone()));
        }
        assert_eq!(inner.bound_paths("name"), vec!["b", "b.name"]);

        let log = Rc::new(RefCell::new(Vec::new()));
        for p in ["b", "b.name"] {
            let log = Rc::clone(&log);
            let _ = registry.subscribe(p, Handler::new(move |_, _| log.borrow_mut().push(p)));
        }

        inner.set("name", "y").unwrap();
        assert_eq!(*log.borrow(), vec!["b", "b.name"]);
        assert_eq!(inner.get("name").as_ref().and_then(Value::as_str), Some("y"));
    }

    #[test]
    fn dropped_root_makes_binding_inert() {
        let inner = ObjectRef::new().with("v", 1);
        let registry = ChangeRegistry::new();
        let hits = Rc::new(RefCell::new(0));
        {
            let root = ObjectRef::new().with("b", inner.clone());
            let mut data = inner.data_mut();
            data.slots
                .get_mut("v")
                .unwrap()
                .bind(Binding::new(&root, path("b"), registry.clone()));
        }
        let hits_clone = Rc::clone(&hits);
        let _w = registry.subscribe("b", Handler::new(move |_, _| *hits_clone.borrow_mut() += 1));

        inner.set("v", 2).unwrap();
        assert_eq!(*hits.borrow(), 0);
        assert_eq!(inner.get("v").and_then(|v| v.as_f64()), Some(2.0));
    }
}
