//! Error type shared by every fallible operation in the crate.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Handler error | A handler returned `Err` | Remaining handlers of that sweep are skipped, error surfaces from the write |
//! | Unresolved path | `set` through a missing or non-object segment | Nothing is written |
//! | Not an object | Observing an atomic value or an array | No observable is created |
//! | Invalid path | Empty path or empty segment (`"a..b"`) | Rejected at parse time |

use std::fmt;

/// Error returned by a fallible handler.
pub type HandlerError = Box<dyn std::error::Error>;

/// Errors from observation and write operations.
#[derive(Debug)]
pub enum WatchError {
    /// A handler registered on `path` failed while being notified.
    Handler {
        path: String,
        source: HandlerError,
    },
    /// `segment` of `path` does not name an object, so the path has no parent
    /// container to write into.
    UnresolvedPath { path: String, segment: String },
    /// Only objects can be observed; `kind` names what was supplied instead.
    NotAnObject { kind: &'static str },
    /// The path string was empty or contained an empty segment.
    InvalidPath(String),
}

impl fmt::Display for WatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler { path, source } => {
                write!(f, "handler for '{path}' failed: {source}")
            }
            Self::UnresolvedPath { path, segment } => {
                write!(f, "cannot resolve '{path}': '{segment}' is not an object")
            }
            Self::NotAnObject { kind } => write!(f, "expected an object, got {kind}"),
            Self::InvalidPath(path) => write!(f, "invalid path: '{path}'"),
        }
    }
}

impl std::error::Error for WatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Handler { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
