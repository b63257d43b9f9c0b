#![forbid(unsafe_code)]

//! Path-keyed handler bookkeeping.
//!
//! # Design
//!
//! [`ChangeRegistry`] maps a path string to an ordered list of [`Handler`]s in
//! shared, reference-counted storage (`Rc<RefCell<..>>`). Cloning a registry
//! creates a new handle to the same table.
//!
//! # Invariants
//!
//! 1. Handlers for a path are notified in registration order.
//! 2. A handler (by identity) appears at most once per path.
//! 3. `notify` works on a snapshot of the list: handlers added or removed
//!    during a sweep take effect from the next sweep.
//!
//! # Failure Modes
//!
//! - **Handler error**: the sweep stops at the first `Err` and the error is
//!   returned wrapped in [`WatchError::Handler`]. Later handlers for that path
//!   are not called.
//! - **Reentrant notify**: a handler that writes to an observed property runs
//!   that nested notification to completion before its own sweep continues.
//!   Unbounded recursion from a handler writing back to its own path is the
//!   caller's responsibility.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::error::{HandlerError, WatchError};
use crate::value::Value;

type HandlerFn = dyn Fn(&Value, &Value) -> Result<(), HandlerError>;

/// A change callback receiving `(new, old)`.
///
/// Cloning a `Handler` keeps its identity; registering two clones of the same
/// handler under one path stores it once.
#[derive(Clone)]
pub struct Handler(Rc<HandlerFn>);

impl Handler {
    /// Wrap an infallible callback.
    pub fn new(f: impl Fn(&Value, &Value) + 'static) -> Self {
        Self(Rc::new(
            move |new: &Value, old: &Value| -> Result<(), HandlerError> {
                f(new, old);
                Ok(())
            },
        ))
    }

    /// Wrap a callback whose error aborts the triggering write.
    pub fn fallible(f: impl Fn(&Value, &Value) -> Result<(), HandlerError> + 'static) -> Self {
        Self(Rc::new(f))
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn call(&self, new: &Value, old: &Value) -> Result<(), HandlerError> {
        (self.0)(new, old)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").finish_non_exhaustive()
    }
}

#[derive(Default)]
struct RegistryInner {
    handlers: HashMap<String, Vec<Handler>>,
}

/// Mapping from path to the handlers watching it.
#[derive(Clone, Default)]
pub struct ChangeRegistry {
    inner: Rc<RefCell<RegistryInner>>,
}

impl fmt::Debug for ChangeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        let mut paths: Vec<_> = inner.handlers.keys().collect();
        paths.sort();
        f.debug_struct("ChangeRegistry")
            .field("paths", &paths)
            .finish()
    }
}

impl ChangeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `path` unless it is already there.
    ///
    /// The returned [`Unwatch`] removes exactly this handler from this path.
    /// Dropping it does **not** unsubscribe.
    pub fn subscribe(&self, path: &str, handler: Handler) -> Unwatch {
        {
            let mut inner = self.inner.borrow_mut();
            let handlers = inner.handlers.entry(path.to_owned()).or_default();
            if handlers.iter().any(|h| h.ptr_eq(&handler)) {
                trace!(path, "handler already registered");
            } else {
                handlers.push(handler.clone());
                trace!(path, count = handlers.len(), "handler registered");
            }
        }
        Unwatch {
            registry: Rc::downgrade(&self.inner),
            path: path.to_owned(),
            handler,
        }
    }

    /// Call every handler registered for `path` with `(new, old)`.
    ///
    /// # Errors
    ///
    /// Returns the first handler failure; handlers after it are skipped.
    pub fn notify(&self, path: &str, new: &Value, old: &Value) -> Result<(), WatchError> {
        // Snapshot so handlers can (un)subscribe without holding the borrow.
        let handlers: Vec<Handler> = match self.inner.borrow().handlers.get(path) {
            Some(handlers) => handlers.clone(),
            None => return Ok(()),
        };
        trace!(path, count = handlers.len(), "notify");
        for handler in &handlers {
            handler
                .call(new, old)
                .map_err(|source| WatchError::Handler {
                    path: path.to_owned(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Number of handlers currently registered for `path`.
    #[must_use]
    pub fn handler_count(&self, path: &str) -> usize {
        self.inner
            .borrow()
            .handlers
            .get(path)
            .map_or(0, Vec::len)
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Capability that removes one handler from one path.
///
/// Calling [`unwatch`](Self::unwatch) more than once is harmless.
pub struct Unwatch {
    registry: Weak<RefCell<RegistryInner>>,
    path: String,
    handler: Handler,
}

impl Unwatch {
    /// Remove the handler. Returns `true` if it was still registered.
    pub fn unwatch(&self) -> bool {
        let Some(inner) = self.registry.upgrade() else {
            return false;
        };
        let mut inner = inner.borrow_mut();
        let Some(handlers) = inner.handlers.get_mut(&self.path) else {
            return false;
        };
        let Some(index) = handlers.iter().position(|h| h.ptr_eq(&self.handler)) else {
            return false;
        };
        handlers.remove(index);
        trace!(path = %self.path, remaining = handlers.len(), "handler removed");
        true
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Debug for Unwatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unwatch")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
