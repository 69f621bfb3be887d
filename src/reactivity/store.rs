//! Dependency Store - Which effects read which (object, key) pairs.
//!
//! A two-level map `ObjectId → Key → ordered set of EffectId`. Buckets are
//! created lazily on first track and pruned when their last effect leaves.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;

use super::runtime::EffectId;
use super::value::ObjectId;

// =============================================================================
// Keys
// =============================================================================

/// A property key on an observed object.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Named map entry.
    Named(Rc<str>),
    /// List item.
    Index(usize),
    /// List length.
    Length,
    /// Reserved key for enumeration (`keys()`), fired on key-set changes.
    Iterate,
    /// Reserved key for computed values and other single-value cells.
    Value,
}

impl Key {
    /// Interpret a string key against a list: `"length"` and numeric
    /// strings map to [`Key::Length`] and [`Key::Index`].
    pub(crate) fn for_list(self) -> Key {
        match self {
            Key::Named(name) if &*name == "length" => Key::Length,
            Key::Named(name) => match name.parse::<usize>() {
                Ok(i) => Key::Index(i),
                Err(_) => Key::Named(name),
            },
            other => other,
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Named(name) => write!(f, "{name:?}"),
            Key::Index(i) => write!(f, "[{i}]"),
            Key::Length => f.write_str("length"),
            Key::Iterate => f.write_str("<iterate>"),
            Key::Value => f.write_str("<value>"),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Named(Rc::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Named(Rc::from(value))
    }
}

impl From<Rc<str>> for Key {
    fn from(value: Rc<str>) -> Self {
        Key::Named(value)
    }
}

impl From<&Rc<str>> for Key {
    fn from(value: &Rc<str>) -> Self {
        Key::Named(value.clone())
    }
}

impl From<usize> for Key {
    fn from(value: usize) -> Self {
        Key::Index(value)
    }
}

/// The kind of mutation being announced by `trigger`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Existing key changed value.
    Set,
    /// Key added.
    Add,
    /// Key removed.
    Delete,
}

impl TriggerKind {
    /// Whether this mutation changes the key set.
    pub fn is_structural(self) -> bool {
        matches!(self, TriggerKind::Add | TriggerKind::Delete)
    }
}

// =============================================================================
// Store
// =============================================================================

type DepSet = IndexSet<EffectId>;

/// Maps observed (object, key) pairs to the effects that read them.
#[derive(Default)]
pub struct DepStore {
    buckets: HashMap<ObjectId, HashMap<Key, DepSet>>,
}

impl DepStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `effect` as a dependent. Returns false if it already was.
    pub fn add(&mut self, target: ObjectId, key: Key, effect: EffectId) -> bool {
        self.buckets
            .entry(target)
            .or_default()
            .entry(key)
            .or_default()
            .insert(effect)
    }

    /// Remove `effect` from one dependency set, pruning empty buckets.
    pub fn remove(&mut self, target: ObjectId, key: &Key, effect: EffectId) {
        let Some(keys) = self.buckets.get_mut(&target) else {
            return;
        };
        if let Some(set) = keys.get_mut(key) {
            set.shift_remove(&effect);
            if set.is_empty() {
                keys.remove(key);
            }
        }
        if keys.is_empty() {
            self.buckets.remove(&target);
        }
    }

    /// Append the dependents of (target, key) to `out`, skipping `exclude`.
    pub fn collect(
        &self,
        target: ObjectId,
        key: &Key,
        exclude: Option<EffectId>,
        out: &mut IndexSet<EffectId>,
    ) {
        let Some(set) = self.buckets.get(&target).and_then(|keys| keys.get(key)) else {
            return;
        };
        out.extend(set.iter().copied().filter(|id| Some(*id) != exclude));
    }

    /// Number of effects depending on (target, key).
    pub fn dependents(&self, target: ObjectId, key: &Key) -> usize {
        self.buckets
            .get(&target)
            .and_then(|keys| keys.get(key))
            .map_or(0, IndexSet::len)
    }

    /// Keys of `target` that currently have dependents.
    pub fn tracked_keys(&self, target: ObjectId) -> Vec<Key> {
        self.buckets
            .get(&target)
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_idempotent() {
        let mut store = DepStore::new();
        let obj = ObjectId::next();
        assert!(store.add(obj, Key::from("a"), EffectId(1)));
        assert!(!store.add(obj, Key::from("a"), EffectId(1)));
        assert_eq!(store.dependents(obj, &Key::from("a")), 1);
    }

    #[test]
    fn test_remove_prunes_empty_buckets() {
        let mut store = DepStore::new();
        let obj = ObjectId::next();
        store.add(obj, Key::from("a"), EffectId(1));
        store.remove(obj, &Key::from("a"), EffectId(1));
        assert!(store.is_empty());
    }

    #[test]
    fn test_collect_keeps_insertion_order_and_excludes() {
        let mut store = DepStore::new();
        let obj = ObjectId::next();
        for id in [3, 1, 2] {
            store.add(obj, Key::from("k"), EffectId(id));
        }
        let mut out = IndexSet::new();
        store.collect(obj, &Key::from("k"), Some(EffectId(1)), &mut out);
        assert_eq!(out.into_iter().collect::<Vec<_>>(), vec![EffectId(3), EffectId(2)]);
    }

    #[test]
    fn test_list_key_normalization() {
        assert_eq!(Key::from("length").for_list(), Key::Length);
        assert_eq!(Key::from("2").for_list(), Key::Index(2));
        assert_eq!(Key::from("x").for_list(), Key::from("x"));
    }
}
