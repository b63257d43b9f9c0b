#![forbid(unsafe_code)]

//! Dotted property paths and their resolution against live data.
//!
//! A path such as `"b.name"` names one property per segment. There is no
//! escaping and no index syntax.

use std::fmt;
use std::str::FromStr;

use crate::error::WatchError;
use crate::value::{ObjectRef, Value};

/// A parsed, non-empty dotted path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    raw: String,
    segments: Vec<String>,
}

impl Path {
    /// Parse a dotted path.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::InvalidPath`] if `raw` is empty or has an empty
    /// segment.
    pub fn parse(raw: &str) -> Result<Self, WatchError> {
        let segments: Vec<String> = raw.split('.').map(str::to_owned).collect();
        if segments.iter().any(String::is_empty) {
            return Err(WatchError::InvalidPath(raw.to_owned()));
        }
        Ok(Self {
            raw: raw.to_owned(),
            segments,
        })
    }

    /// A one-segment path naming `key` verbatim, dots included.
    #[must_use]
    pub fn single(key: &str) -> Self {
        Self {
            raw: key.to_owned(),
            segments: vec![key.to_owned()],
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Path {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Outcome of walking a path from a root object.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The addressed value; `Undefined` if missing or unreachable.
    pub value: Value,
    /// Container one level above `value` when `complete`, otherwise the
    /// deepest object the walk reached.
    pub container: ObjectRef,
    /// Last segment when `complete`, otherwise the segment the walk stopped at.
    pub segment: String,
    /// Whether every intermediate segment named an object.
    pub complete: bool,
}

/// Walk `path` from `root`, one segment at a time.
///
/// Never fails: a missing or non-object intermediate segment stops the walk
/// and yields `Undefined`.
#[must_use]
pub fn resolve(root: &ObjectRef, path: &Path) -> Resolution {
    let mut container = root.clone();
    let Some((last, intermediate)) = path.segments().split_last() else {
        return Resolution {
            value: Value::Undefined,
            container,
            segment: String::new(),
            complete: false,
        };
    };

    for segment in intermediate {
        match container.get(segment) {
            Some(Value::Object(next)) => container = next,
            _ => {
                return Resolution {
                    value: Value::Undefined,
                    container,
                    segment: segment.clone(),
                    complete: false,
                };
            }
        }
    }

    Resolution {
        value: container.get(last).unwrap_or_default(),
        container,
        segment: last.clone(),
        complete: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (ObjectRef, ObjectRef) {
        let b = ObjectRef::new().with("name", "qtx").with("value", 1);
        let root = ObjectRef::new().with("a", 1).with("b", b.clone());
        (root, b)
    }

    #[test]
    fn parse_rejects_empty_segments() {
        assert!(Path::parse("").is_err());
        assert!(Path::parse("a..b").is_err());
        assert!(Path::parse(".a").is_err());
        assert!(Path::parse("a.").is_err());
        assert_eq!(Path::parse("a.b").unwrap().segments(), ["a", "b"]);
    }

    #[test]
    fn single_keeps_dots() {
        let p = Path::single("x.y");
        assert_eq!(p.segments(), ["x.y"]);
        assert_eq!(p.to_string(), "x.y");
    }

    #[test]
    fn resolves_root_level() {
        let (root, _) = fixture();
        let res = resolve(&root, &"a".parse().unwrap());
        assert!(res.complete);
        assert!(res.container.ptr_eq(&root));
        assert_eq!(res.segment, "a");
        assert_eq!(res.value.as_f64(), Some(1.0));
    }

    #[test]
    fn resolves_nested_to_parent() {
        let (root, b) = fixture();
        let res = resolve(&root, &"b.name".parse().unwrap());
        assert!(res.complete);
        assert!(res.container.ptr_eq(&b));
        assert_eq!(res.segment, "name");
        assert_eq!(res.value.as_str(), Some("qtx"));
    }

    #[test]
    fn missing_leaf_is_undefined_but_complete() {
        let (root, b) = fixture();
        let res = resolve(&root, &"b.missing".parse().unwrap());
        assert!(res.complete);
        assert!(res.container.ptr_eq(&b));
        assert!(res.value.is_undefined());
    }

    #[test]
    fn missing_intermediate_stops_without_error() {
        let (root, _) = fixture();
        let res = resolve(&root, &"x.y.z".parse().unwrap());
        assert!(!res.complete);
        assert!(res.container.ptr_eq(&root));
        assert_eq!(res.segment, "x");
        assert!(res.value.is_undefined());
    }

    #[test]
    fn atomic_intermediate_stops() {
        let (root, _) = fixture();
        let res = resolve(&root, &"b.value.deep".parse().unwrap());
        assert!(!res.complete);
        assert_eq!(res.segment, "value");
    }
}
