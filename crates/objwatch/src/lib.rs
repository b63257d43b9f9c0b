#![forbid(unsafe_code)]

//! Path-addressed change notification over shared, nested object graphs.
//!
//! # Role
//! `objwatch` turns a plain object graph into one whose property writes can
//! be observed by dotted path (`"a"`, `"b.name"`). Handlers receive
//! `(new, old)` synchronously, before the write that triggered them returns.
//!
//! # Primary pieces
//! - **[`Value`] / [`ObjectRef`] / [`ArrayRef`]**: tagged-union data model with
//!   shared container handles.
//! - **[`is_atomic`] / [`deep_clone`]**: leaf classification and structural
//!   copies used for old-value snapshots and cloned observation.
//! - **[`resolve`]**: walks a [`Path`] against live data.
//! - **[`ChangeRegistry`]**: path-keyed handler lists with [`Unwatch`]
//!   capabilities.
//! - **[`Observable`]**: lazily binds the slots a watched path reaches and
//!   routes their writes to the registry.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use objwatch::{Handler, ObjectRef, Value};
//!
//! let source = ObjectRef::new()
//!     .with("a", 1)
//!     .with("b", ObjectRef::new().with("name", "qtx"));
//! let obs = objwatch::from(&source, true);
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let seen_clone = Rc::clone(&seen);
//! obs.watch("a", Handler::new(move |new: &Value, old: &Value| {
//!     seen_clone.borrow_mut().push((new.as_f64(), old.as_f64()));
//! }));
//!
//! obs.set("a", 10).unwrap();
//! assert_eq!(*seen.borrow(), vec![(Some(10.0), Some(1.0))]);
//! // The source was cloned, so it is untouched.
//! assert_eq!(source.get("a").and_then(|v| v.as_f64()), Some(1.0));
//! ```
//!
//! # Limitations
//! Array elements are never observed, properties added after a path is
//! watched are not picked up until it is watched again, and cyclic graphs are
//! unsupported.

pub mod clone;
pub mod error;
#[cfg(feature = "json")]
pub mod json;
pub mod observable;
pub mod path;
pub mod registry;
mod slot;
pub mod value;

pub use clone::{deep_clone, deep_clone_object, is_atomic};
pub use error::{HandlerError, WatchError};
pub use observable::{Observable, ObserveOptions};
pub use path::{Path, Resolution, resolve};
pub use registry::{ChangeRegistry, Handler, Unwatch};
pub use value::{ArrayRef, Callable, ObjectRef, Prototype, RegExp, Value};

/// Observe `object`, or a deep copy of it when `clone` is true.
#[must_use]
pub fn from(object: &ObjectRef, clone: bool) -> Observable {
    Observable::with_options(object, ObserveOptions::new().with_clone(clone))
}
