#![forbid(unsafe_code)]

//! Tagged-union value model for observed object graphs.
//!
//! # Design
//!
//! [`Value`] covers the leaf kinds (undefined, null, booleans, numbers,
//! strings, regular expressions, callables) and two container kinds
//! ([`ArrayRef`], [`ObjectRef`]). Containers are shared, reference-counted
//! handles (`Rc<RefCell<..>>`): cloning a `Value` clones the handle, so two
//! clones of an object value see the same properties. Structural copies are
//! made only by [`deep_clone`](crate::deep_clone).
//!
//! Each object property lives in a [`Slot`](crate::slot) that is either plain
//! data or observed. Writes through [`ObjectRef::set`] on an observed slot
//! notify every path bound to it before returning.
//!
//! # Invariants
//!
//! 1. Object keys iterate in insertion order.
//! 2. Array elements are always plain values.
//! 3. Two handles are the same container iff `ptr_eq` returns true.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::error::WatchError;
use crate::slot::{self, Slot};

/// An opaque callable leaf value, compared by identity.
#[derive(Clone)]
pub struct Callable(Rc<dyn Fn(&[Value]) -> Value>);

impl Callable {
    /// Wrap a closure.
    pub fn new(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke the callable.
    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }

    /// Whether both handles wrap the same closure.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[function]")
    }
}

/// A regular expression leaf. Kept opaque: only its source text and flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegExp {
    pub source: String,
    pub flags: String,
}

impl RegExp {
    #[must_use]
    pub fn new(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            flags: flags.into(),
        }
    }
}

/// Named capability tag shared by an object and all of its deep copies.
///
/// Identity, not the name, decides whether two objects share a prototype.
#[derive(Clone)]
pub struct Prototype(Rc<str>);

impl Prototype {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(Rc::from(name))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Prototype").field(&self.name()).finish()
    }
}

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    RegExp(RegExp),
    Function(Callable),
    Array(ArrayRef),
    Object(ObjectRef),
}

impl Value {
    /// Short name of the variant, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::RegExp(_) => "regexp",
            Self::Function(_) => "function",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Truthiness: `undefined`, `null`, `false`, `0`, `NaN` and `""` are falsy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::RegExp(_) | Self::Function(_) | Self::Array(_) | Self::Object(_) => true,
        }
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Compare by contents. Containers are compared element by element,
    /// callables by identity. Prototypes are not compared.
    #[must_use]
    pub fn structural_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::RegExp(a), Self::RegExp(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::Array(a), Self::Array(b)) => {
                if a.ptr_eq(b) {
                    return true;
                }
                let (a, b) = (a.to_vec(), b.to_vec());
                a.len() == b.len() && a.iter().zip(&b).all(|(x, y)| x.structural_eq(y))
            }
            (Self::Object(a), Self::Object(b)) => {
                if a.ptr_eq(b) {
                    return true;
                }
                let (a, b) = (a.entries(), b.entries());
                a.len() == b.len()
                    && a.iter()
                        .zip(&b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.structural_eq(vb))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::RegExp(r) => write!(f, "/{}/{}", r.source, r.flags),
            Self::Function(c) => fmt::Debug::fmt(c, f),
            Self::Array(a) => fmt::Debug::fmt(a, f),
            Self::Object(o) => fmt::Debug::fmt(o, f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<RegExp> for Value {
    fn from(r: RegExp) -> Self {
        Self::RegExp(r)
    }
}

impl From<Callable> for Value {
    fn from(c: Callable) -> Self {
        Self::Function(c)
    }
}

impl From<ArrayRef> for Value {
    fn from(a: ArrayRef) -> Self {
        Self::Array(a)
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Self::Object(o)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

// ---------------------------------------------------------------------------
// Arrays
// ---------------------------------------------------------------------------

/// Shared handle to an ordered sequence of values.
///
/// Element writes are never observed.
#[derive(Clone, Default)]
pub struct ArrayRef {
    inner: Rc<RefCell<Vec<Value>>>,
}

impl ArrayRef {
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(items)),
        }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.borrow().get(index).cloned()
    }

    /// Replace the element at `index`, growing with `undefined` if needed.
    ///
    /// Returns `false` and leaves the array untouched if it cannot grow to
    /// `index + 1` elements.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> bool {
        let mut items = self.inner.borrow_mut();
        if index >= items.len() {
            let Some(new_len) = index.checked_add(1) else {
                return false;
            };
            let additional = new_len - items.len();
            if items.try_reserve(additional).is_err() {
                return false;
            }
            items.resize(new_len, Value::Undefined);
        }
        items[index] = value.into();
        true
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.inner.borrow_mut().push(value.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    /// Shallow copy of the elements (containers stay shared).
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.borrow().clone()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl FromIterator<Value> for ArrayRef {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.borrow().iter()).finish()
    }
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

/// Interior of an [`ObjectRef`].
#[derive(Default)]
pub(crate) struct ObjectData {
    pub(crate) slots: IndexMap<String, Slot>,
    pub(crate) prototype: Option<Prototype>,
}

/// Shared handle to a keyed collection of property slots.
///
/// Cloning an `ObjectRef` creates a new handle to the **same** object.
#[derive(Clone, Default)]
pub struct ObjectRef {
    inner: Rc<RefCell<ObjectData>>,
}

/// Non-owning handle to an object, held by observed slots that point back at
/// their watch root.
#[derive(Clone)]
pub(crate) struct WeakObjectRef(Weak<RefCell<ObjectData>>);

impl WeakObjectRef {
    pub(crate) fn upgrade(&self) -> Option<ObjectRef> {
        self.0.upgrade().map(|inner| ObjectRef { inner })
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl ObjectRef {
    /// Create an empty object with no prototype.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty object carrying `prototype`.
    #[must_use]
    pub fn with_prototype(prototype: Prototype) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObjectData {
                slots: IndexMap::new(),
                prototype: Some(prototype),
            })),
        }
    }

    /// Builder-style insert for constructing fixtures. Never notifies.
    #[must_use]
    pub fn with(self, key: &str, value: impl Into<Value>) -> Self {
        self.inner
            .borrow_mut()
            .slots
            .insert(key.to_owned(), Slot::Plain(value.into()));
        self
    }

    /// Current value of `key`, or `None` if the object has no such key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.borrow().slots.get(key).map(|s| s.value().clone())
    }

    /// Write `value` into `key`.
    ///
    /// A plain or missing key is simply stored. An observed key snapshots
    /// every bound path, installs the value, then notifies those paths.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Handler`] if a notified handler fails. The new
    /// value is installed regardless.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<(), WatchError> {
        slot::write(self, key, value.into())
    }

    /// Remove `key`, dropping any observation attached to it. Never notifies.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner
            .borrow_mut()
            .slots
            .shift_remove(key)
            .map(Slot::into_value)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.borrow().slots.contains_key(key)
    }

    /// Keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().slots.keys().cloned().collect()
    }

    /// Key/value pairs in insertion order (values shallow-cloned).
    #[must_use]
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.inner
            .borrow()
            .slots
            .iter()
            .map(|(k, s)| (k.clone(), s.value().clone()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().slots.is_empty()
    }

    #[must_use]
    pub fn prototype(&self) -> Option<Prototype> {
        self.inner.borrow().prototype.clone()
    }

    pub fn set_prototype(&self, prototype: Option<Prototype>) {
        self.inner.borrow_mut().prototype = prototype;
    }

    /// Whether `key` has been converted into an observed slot.
    #[must_use]
    pub fn is_observed(&self, key: &str) -> bool {
        self.inner
            .borrow()
            .slots
            .get(key)
            .is_some_and(Slot::is_observed)
    }

    /// Paths notified when `key` is written, in binding order.
    #[must_use]
    pub fn bound_paths(&self, key: &str) -> Vec<String> {
        self.inner
            .borrow()
            .slots
            .get(key)
            .map(Slot::bound_paths)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakObjectRef {
        WeakObjectRef(Rc::downgrade(&self.inner))
    }

    pub(crate) fn data(&self) -> Ref<'_, ObjectData> {
        self.inner.borrow()
    }

    pub(crate) fn data_mut(&self) -> RefMut<'_, ObjectData> {
        self.inner.borrow_mut()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for ObjectRef {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let slots = iter
            .into_iter()
            .map(|(k, v)| (k.into(), Slot::Plain(v)))
            .collect();
        Self {
            inner: Rc::new(RefCell::new(ObjectData {
                slots,
                prototype: None,
            })),
        }
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.inner.borrow();
        let mut map = f.debug_map();
        for (key, slot) in &data.slots {
            map.entry(key, slot.value());
        }
        map.finish()
    }
}
