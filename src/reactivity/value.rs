//! Dynamic values - The data reactive objects are made of.
//!
//! Reactive state is described with plain dynamic data:
//! - [`Value`] - A single dynamic value (number, string, object, callback, ...)
//! - [`RawObject`] - A shared, identity-carrying map or list
//! - [`Callback`] - A shared function value (event handlers, setup methods)
//!
//! # Equality
//!
//! Values compare with same-value-zero semantics: `NaN` equals `NaN`,
//! `+0` equals `-0`, objects and callbacks compare by identity.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::reactive::Reactive;

// =============================================================================
// Object Identity
// =============================================================================

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of an observed object in the dependency store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Allocate a fresh identity.
    pub fn next() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

// =============================================================================
// Callback
// =============================================================================

/// A shared function value.
///
/// Cloning shares the same function; equality is pointer identity.
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn(&[Value]) -> Value>);

impl Callback {
    /// Wrap a function taking positional arguments.
    pub fn new(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Callback(Rc::new(f))
    }

    /// Wrap a function that ignores its arguments and returns nothing.
    pub fn from_fn(f: impl Fn() + 'static) -> Self {
        Callback(Rc::new(move |_| {
            f();
            Value::Undefined
        }))
    }

    /// Invoke the callback.
    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }

    /// Whether two callbacks share the same function.
    pub fn ptr_eq(&self, other: &Callback) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

// =============================================================================
// Raw Object
// =============================================================================

/// Storage behind a [`RawObject`].
pub enum RawData {
    /// String-keyed map, iterated in insertion order.
    Map {
        entries: IndexMap<Rc<str>, Value>,
        /// Prototype consulted for keys missing from `entries`.
        proto: Option<Reactive>,
    },
    /// Index-keyed list.
    List(Vec<Value>),
}

struct RawInner {
    id: ObjectId,
    data: RefCell<RawData>,
}

/// A plain (non-reactive) shared object: a map or a list.
///
/// Reads and writes through a `RawObject` never track or trigger. Wrap it
/// with [`Runtime::reactive`](super::Runtime::reactive) to observe it.
#[derive(Clone)]
pub struct RawObject(Rc<RawInner>);

impl RawObject {
    /// Create an empty map.
    pub fn map() -> Self {
        Self::from_data(RawData::Map {
            entries: IndexMap::new(),
            proto: None,
        })
    }

    /// Create a list from values.
    pub fn list(items: Vec<Value>) -> Self {
        Self::from_data(RawData::List(items))
    }

    fn from_data(data: RawData) -> Self {
        RawObject(Rc::new(RawInner {
            id: ObjectId::next(),
            data: RefCell::new(data),
        }))
    }

    /// Builder-style insert for maps.
    pub fn with(self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Identity used by the dependency store.
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// Whether two handles point at the same object.
    pub fn ptr_eq(&self, other: &RawObject) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_list(&self) -> bool {
        matches!(&*self.0.data.borrow(), RawData::List(_))
    }

    pub(crate) fn data(&self) -> Ref<'_, RawData> {
        self.0.data.borrow()
    }

    pub(crate) fn data_mut(&self) -> RefMut<'_, RawData> {
        self.0.data.borrow_mut()
    }

    /// Read an own map entry or list item without tracking.
    pub fn get(&self, key: &str) -> Value {
        match &*self.data() {
            RawData::Map { entries, .. } => entries.get(key).cloned().unwrap_or_default(),
            RawData::List(items) => key
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or_default(),
        }
    }

    /// Insert a map entry without triggering. No-op on lists.
    pub fn insert(&self, key: &str, value: impl Into<Value>) {
        if let RawData::Map { entries, .. } = &mut *self.data_mut() {
            entries.insert(Rc::from(key), value.into().into_raw());
        }
    }

    /// Remove a map entry without triggering.
    pub fn remove(&self, key: &str) -> Option<Value> {
        match &mut *self.data_mut() {
            RawData::Map { entries, .. } => entries.shift_remove(key),
            RawData::List(_) => None,
        }
    }

    /// Whether the map has an own entry for `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        match &*self.data() {
            RawData::Map { entries, .. } => entries.contains_key(key),
            RawData::List(items) => key.parse::<usize>().is_ok_and(|i| i < items.len()),
        }
    }

    /// Own keys in insertion order (indices for lists).
    pub fn keys(&self) -> Vec<Rc<str>> {
        match &*self.data() {
            RawData::Map { entries, .. } => entries.keys().cloned().collect(),
            RawData::List(items) => (0..items.len()).map(|i| Rc::from(i.to_string())).collect(),
        }
    }

    /// Snapshot of own entries in insertion order.
    pub fn entries(&self) -> Vec<(Rc<str>, Value)> {
        match &*self.data() {
            RawData::Map { entries, .. } => {
                entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            }
            RawData::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (Rc::from(i.to_string()), v.clone()))
                .collect(),
        }
    }

    /// Number of own entries or list items.
    pub fn len(&self) -> usize {
        match &*self.data() {
            RawData::Map { entries, .. } => entries.len(),
            RawData::List(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for RawObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.data.try_borrow() {
            Ok(data) => match &*data {
                RawData::Map { entries, .. } => f.debug_map().entries(entries.iter()).finish(),
                RawData::List(items) => f.debug_list().entries(items.iter()).finish(),
            },
            Err(_) => write!(f, "RawObject({:?}, <borrowed>)", self.0.id),
        }
    }
}

// =============================================================================
// Value
// =============================================================================

/// A dynamic value stored in reactive objects and virtual node props.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    /// A plain object (not observed).
    Object(RawObject),
    Function(Callback),
    /// A reactive view of an object, produced by deep reads.
    Reactive(Reactive),
}

impl Value {
    /// Same-value-zero comparison.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => match (self.object_id(), other.object_id()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Identity of the underlying object, reactive or not.
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Value::Object(raw) => Some(raw.id()),
            Value::Reactive(r) => Some(r.raw().id()),
            _ => None,
        }
    }

    /// Strip any reactive wrapper, yielding the value to store in raw data.
    pub fn into_raw(self) -> Value {
        match self {
            Value::Reactive(r) => Value::Object(r.raw().clone()),
            other => other,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Truthiness as used by conditionals in render code.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Object(_) | Value::Function(_) | Value::Reactive(_) => true,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Value::Reactive(r) => Some(r),
            _ => None,
        }
    }

    /// The plain object behind this value, unwrapping reactive views.
    pub fn as_object(&self) -> Option<RawObject> {
        match self {
            Value::Object(raw) => Some(raw.clone()),
            Value::Reactive(r) => Some(r.raw().clone()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", NumberDisplay(*n)),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Object(raw) => write!(f, "{raw:?}"),
            Value::Function(cb) => write!(f, "{cb:?}"),
            Value::Reactive(r) => write!(f, "Reactive({:?})", r.raw()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", NumberDisplay(*n)),
            Value::Str(s) => f.write_str(s),
            Value::Object(_) | Value::Reactive(_) => f.write_str("[object Object]"),
            Value::Function(_) => f.write_str("[function]"),
        }
    }
}

/// Integral numbers print without a fractional part.
struct NumberDisplay(f64);

impl fmt::Display for NumberDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.0;
        if n.is_nan() {
            f.write_str("NaN")
        } else if n.is_infinite() {
            f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
        } else if n.fract() == 0.0 && n.abs() < 1e15 {
            write!(f, "{}", n as i64)
        } else {
            write!(f, "{n}")
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Rc::from(value))
    }
}

impl From<Rc<str>> for Value {
    fn from(value: Rc<str>) -> Self {
        Value::Str(value)
    }
}

impl From<RawObject> for Value {
    fn from(value: RawObject) -> Self {
        Value::Object(value)
    }
}

impl From<Reactive> for Value {
    fn from(value: Reactive) -> Self {
        Value::Reactive(value)
    }
}

impl From<Callback> for Value {
    fn from(value: Callback) -> Self {
        Value::Function(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_is_same_value() {
        assert!(Value::Number(f64::NAN).same_value(&Value::Number(f64::NAN)));
        assert!(Value::Number(0.0).same_value(&Value::Number(-0.0)));
        assert!(!Value::Number(1.0).same_value(&Value::Number(2.0)));
    }

    #[test]
    fn test_objects_compare_by_identity() {
        let a = RawObject::map().with("x", 1);
        let b = RawObject::map().with("x", 1);
        assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
        assert_ne!(Value::from(a), Value::from(b));
    }

    #[test]
    fn test_display_formats_like_text() {
        assert_eq!(Value::from(3).to_string(), "3");
        assert_eq!(Value::from(1.5).to_string(), "1.5");
        assert_eq!(Value::from("hi").to_string(), "hi");
        assert_eq!(Value::Undefined.to_string(), "undefined");
    }

    #[test]
    fn test_raw_object_keeps_insertion_order() {
        let obj = RawObject::map().with("b", 1).with("a", 2);
        let keys: Vec<String> = obj.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(obj.remove("b"), Some(Value::from(1)));
        assert_eq!(obj.len(), 1);
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(Value::from(RawObject::map()).is_truthy());
    }
}
