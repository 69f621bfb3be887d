//! Reactive Objects - Observed views over plain data.
//!
//! A [`Reactive`] wraps a [`RawObject`] and routes every access through the
//! runtime:
//!
//! | operation | map                         | list                        |
//! |-----------|-----------------------------|-----------------------------|
//! | `get`     | track key                   | track index / length        |
//! | `has`     | track key                   | track index                 |
//! | `keys`    | track `Iterate`             | track `Length`              |
//! | `set`     | trigger `Set` / `Add`       | trigger `Set` / `Add`+length|
//! | `delete`  | trigger `Delete` if own key | trigger `Delete` if in range|
//!
//! # Variants
//!
//! - deep (default): nested objects come back wrapped, lazily on read
//! - shallow: nested objects come back raw
//! - readonly: writes and deletes are refused with a warning
//!
//! # Prototype Chains
//!
//! A map can delegate missing keys to a prototype (another `Reactive`).
//! Reads fall through and track on the prototype. Writes always land on the
//! child as own keys, so only the child triggers and a readonly prototype
//! never refuses them.

use std::fmt;
use std::rc::Weak;

use bitflags::bitflags;
use tracing::warn;

use super::runtime::{Runtime, RuntimeInner};
use super::store::{Key, TriggerKind};
use super::value::{RawData, RawObject, Value};

bitflags! {
    /// Wrapping policy of a [`Reactive`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ReactiveFlags: u8 {
        /// Nested objects are returned unwrapped.
        const SHALLOW = 1 << 0;
        /// Writes and deletes are rejected.
        const READONLY = 1 << 1;
    }
}

/// An observed view of a [`RawObject`].
///
/// Cloning creates another view of the same object with the same flags.
#[derive(Clone)]
pub struct Reactive {
    runtime: Weak<RuntimeInner>,
    target: RawObject,
    flags: ReactiveFlags,
}

impl Runtime {
    /// Deep, writable view.
    pub fn reactive(&self, target: RawObject) -> Reactive {
        Reactive::new(self, target, ReactiveFlags::empty())
    }

    /// Writable view whose nested objects are not wrapped.
    pub fn shallow_reactive(&self, target: RawObject) -> Reactive {
        Reactive::new(self, target, ReactiveFlags::SHALLOW)
    }

    /// Deep, read-only view.
    pub fn readonly(&self, target: RawObject) -> Reactive {
        Reactive::new(self, target, ReactiveFlags::READONLY)
    }

    /// Read-only view whose nested objects are not wrapped.
    pub fn shallow_readonly(&self, target: RawObject) -> Reactive {
        Reactive::new(self, target, ReactiveFlags::SHALLOW | ReactiveFlags::READONLY)
    }
}

impl Reactive {
    fn new(runtime: &Runtime, target: RawObject, flags: ReactiveFlags) -> Self {
        Self {
            runtime: runtime.downgrade(),
            target,
            flags,
        }
    }

    /// The underlying object. Accesses through it are not observed.
    pub fn raw(&self) -> &RawObject {
        &self.target
    }

    pub fn flags(&self) -> ReactiveFlags {
        self.flags
    }

    pub fn is_shallow(&self) -> bool {
        self.flags.contains(ReactiveFlags::SHALLOW)
    }

    pub fn is_readonly(&self) -> bool {
        self.flags.contains(ReactiveFlags::READONLY)
    }

    /// A read-only view of the same object. Reads still track, so the view
    /// follows changes made through writable views.
    pub fn readonly_view(&self) -> Reactive {
        Reactive {
            runtime: self.runtime.clone(),
            target: self.target.clone(),
            flags: self.flags | ReactiveFlags::READONLY,
        }
    }

    /// Whether both views observe the same object.
    pub fn same_target(&self, other: &Reactive) -> bool {
        self.target.ptr_eq(&other.target)
    }

    /// Install (or clear) the prototype consulted for missing map keys.
    pub fn set_prototype(&self, proto: Option<Reactive>) {
        if let RawData::Map { proto: slot, .. } = &mut *self.target.data_mut() {
            *slot = proto;
        }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Read a property, tracking it.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = self.normalize(key.into());
        self.track(key.clone());
        let value = self.read(&key);
        self.wrap(value)
    }

    /// Whether the property exists (own or inherited), tracking it.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = self.normalize(key.into());
        self.track(key.clone());
        let proto = match &*self.target.data() {
            RawData::List(items) => {
                return match key {
                    Key::Index(i) => i < items.len(),
                    Key::Length => true,
                    _ => false,
                };
            }
            RawData::Map { entries, proto } => match &key {
                Key::Named(name) if entries.contains_key(name) => return true,
                _ => proto.clone(),
            },
        };
        proto.is_some_and(|proto| proto.has(key))
    }

    /// Own keys, tracking the key set (not the values).
    pub fn keys(&self) -> Vec<Key> {
        if self.target.is_list() {
            self.track(Key::Length);
        } else {
            self.track(Key::Iterate);
        }
        match &*self.target.data() {
            RawData::Map { entries, .. } => entries.keys().map(Key::from).collect(),
            RawData::List(items) => (0..items.len()).map(Key::Index).collect(),
        }
    }

    /// Number of own entries, tracking the key set.
    pub fn len(&self) -> usize {
        if self.target.is_list() {
            self.track(Key::Length);
        } else {
            self.track(Key::Iterate);
        }
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Write a property. Returns false if the write was refused.
    ///
    /// Triggers `Add` for new own keys, and `Set` for existing ones only
    /// when the value actually changed (same-value-zero).
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        let key = self.normalize(key.into());
        if self.is_readonly() {
            warn!(key = ?key, "write to readonly reactive ignored");
            return false;
        }
        let value = value.into().into_raw();
        if self.target.is_list() {
            return self.set_list(key, value);
        }
        let Key::Named(name) = key else {
            warn!(key = ?key, "non-named key written to a map");
            return false;
        };

        // Writes never reach the prototype: an inherited key becomes an own key.
        let old = match &mut *self.target.data_mut() {
            RawData::Map { entries, .. } => entries.insert(name.clone(), value.clone()),
            RawData::List(_) => return false,
        };
        match old {
            None => self.trigger(&[Key::Named(name)], TriggerKind::Add),
            Some(old) if !old.same_value(&value) => {
                self.trigger(&[Key::Named(name)], TriggerKind::Set);
            }
            Some(_) => {}
        }
        true
    }

    fn set_list(&self, key: Key, value: Value) -> bool {
        match key {
            Key::Index(i) => {
                let kind = {
                    let mut data = self.target.data_mut();
                    let RawData::List(items) = &mut *data else {
                        return false;
                    };
                    if i < items.len() {
                        if items[i].same_value(&value) {
                            return true;
                        }
                        items[i] = value;
                        TriggerKind::Set
                    } else {
                        items.resize(i, Value::Undefined);
                        items.push(value);
                        TriggerKind::Add
                    }
                };
                self.trigger(&[Key::Index(i)], kind);
                true
            }
            Key::Length => match value.as_f64() {
                Some(n) if n >= 0.0 && n.fract() == 0.0 => self.set_len(n as usize),
                _ => {
                    warn!(value = ?value, "invalid list length");
                    false
                }
            },
            other => {
                warn!(key = ?other, "non-index key written to a list");
                false
            }
        }
    }

    /// Append to a list without tracking its length. Returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        let len = self.target.len();
        if self.set(Key::Index(len), value) {
            len + 1
        } else {
            len
        }
    }

    /// Resize a list. Fires `Set` on `Length`; shrinking also fires `Delete`
    /// on every removed index, all in one pass.
    pub fn set_len(&self, len: usize) -> bool {
        if self.is_readonly() {
            warn!(len, "resize of readonly reactive ignored");
            return false;
        }
        let old_len = {
            let mut data = self.target.data_mut();
            let RawData::List(items) = &mut *data else {
                return false;
            };
            let old_len = items.len();
            if old_len == len {
                return true;
            }
            items.resize(len, Value::Undefined);
            old_len
        };
        let mut changes = vec![(Key::Length, TriggerKind::Set)];
        changes.extend((len..old_len).map(|i| (Key::Index(i), TriggerKind::Delete)));
        if let Some(rt) = self.runtime() {
            rt.trigger_changes(self.target.id(), &changes);
        }
        true
    }

    /// Remove an own property. Triggers only if the key existed.
    pub fn delete(&self, key: impl Into<Key>) -> bool {
        let key = self.normalize(key.into());
        if self.is_readonly() {
            warn!(key = ?key, "delete on readonly reactive ignored");
            return false;
        }
        let removed = match (&mut *self.target.data_mut(), &key) {
            (RawData::Map { entries, .. }, Key::Named(name)) => {
                entries.shift_remove(name).is_some()
            }
            (RawData::List(items), Key::Index(i)) if *i < items.len() => {
                // Leaves a hole, like deleting an array slot.
                items[*i] = Value::Undefined;
                true
            }
            _ => false,
        };
        if removed {
            self.trigger(&[key], TriggerKind::Delete);
        }
        removed
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn normalize(&self, key: Key) -> Key {
        if self.target.is_list() {
            key.for_list()
        } else {
            key
        }
    }

    fn runtime(&self) -> Option<Runtime> {
        self.runtime.upgrade().map(Runtime::from_inner)
    }

    fn track(&self, key: Key) {
        if let Some(rt) = self.runtime() {
            rt.track(self.target.id(), key);
        }
    }

    fn trigger(&self, keys: &[Key], kind: TriggerKind) {
        if let Some(rt) = self.runtime() {
            rt.trigger_keys(self.target.id(), keys, kind);
        }
    }

    /// Raw read; falls through to the prototype (which tracks on itself).
    fn read(&self, key: &Key) -> Value {
        let proto = match &*self.target.data() {
            RawData::List(items) => {
                return match key {
                    Key::Index(i) => items.get(*i).cloned().unwrap_or_default(),
                    Key::Length => Value::from(items.len()),
                    _ => Value::Undefined,
                };
            }
            RawData::Map { entries, proto } => match key {
                Key::Named(name) => match entries.get(name) {
                    Some(value) => return value.clone(),
                    None => proto.clone(),
                },
                _ => return Value::Undefined,
            },
        };
        match proto {
            Some(proto) => proto.get(key.clone()).into_raw(),
            None => Value::Undefined,
        }
    }

    fn wrap(&self, value: Value) -> Value {
        match value {
            Value::Object(raw) if !self.is_shallow() => Value::Reactive(Reactive {
                runtime: self.runtime.clone(),
                target: raw,
                flags: self.flags,
            }),
            other => other,
        }
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("id", &self.target.id())
            .field("flags", &self.flags)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
