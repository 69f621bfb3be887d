//! Computed values and watchers.
//!
//! # Computed
//!
//! [`Computed<T>`] wraps a getter in a lazy effect. The effect's scheduler
//! doesn't re-run the getter; it only marks the cache dirty and notifies
//! whoever read the computed. The next [`Computed::get`] recomputes.
//!
//! # Invariants
//!
//! 1. The getter runs only from `get()`, and only while dirty.
//! 2. Dirty is set on the clean → dirty edge exactly once per change cycle;
//!    readers of the computed are notified on that edge only.
//! 3. `get()` always tracks, so effects reading a computed depend on it
//!    transitively.
//!
//! # Watch
//!
//! [`Runtime::watch`] observes any getter and calls back with the new and
//! previous values whenever a dependency changes.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::warn;

use super::runtime::{Effect, EffectOptions, Job, Runtime, RuntimeInner, Scheduler};
use super::store::{Key, TriggerKind};
use super::value::ObjectId;

// =============================================================================
// Computed
// =============================================================================

struct ComputedInner<T> {
    /// Identity under which readers track this computed.
    id: ObjectId,
    runtime: Weak<RuntimeInner>,
    effect: Effect<T>,
    cached: RefCell<Option<T>>,
    dirty: Rc<Cell<bool>>,
}

/// A lazily evaluated, cached value derived from reactive reads.
///
/// Cloning creates a new handle to the same cache.
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("cached", &self.inner.cached.try_borrow().ok())
            .field("dirty", &self.inner.dirty.get())
            .finish()
    }
}

impl Runtime {
    /// Create a computed value. The getter doesn't run until the first
    /// [`Computed::get`].
    pub fn computed<T: Clone + Default + 'static>(
        &self,
        getter: impl FnMut() -> T + 'static,
    ) -> Computed<T> {
        let id = ObjectId::next();
        let dirty = Rc::new(Cell::new(true));

        let weak = self.downgrade();
        let flag = Rc::clone(&dirty);
        let scheduler: Scheduler = Rc::new(move |_job: Job| {
            if flag.get() {
                return;
            }
            flag.set(true);
            if let Some(inner) = weak.upgrade() {
                Runtime::from_inner(inner).trigger(id, Key::Value, TriggerKind::Set);
            }
        });

        let effect = self.effect_with(
            getter,
            EffectOptions {
                lazy: true,
                scheduler: Some(scheduler),
                label: Some(Rc::from("computed")),
            },
        );

        Computed {
            inner: Rc::new(ComputedInner {
                id,
                runtime: self.downgrade(),
                effect,
                cached: RefCell::new(None),
                dirty,
            }),
        }
    }
}

impl<T: Clone + Default + 'static> Computed<T> {
    /// Current value, recomputing if a dependency changed since the last
    /// read.
    ///
    /// A computed that reads itself gets its last cached value (or
    /// `T::default()` before the first computation).
    pub fn get(&self) -> T {
        let inner = &self.inner;
        if inner.dirty.get() {
            if let Some(value) = inner.effect.run() {
                *inner.cached.borrow_mut() = Some(value);
                inner.dirty.set(false);
            }
        }
        if let Some(rt) = inner.runtime.upgrade() {
            Runtime::from_inner(rt).track(inner.id, Key::Value);
        }
        inner.cached.borrow().clone().unwrap_or_default()
    }

    /// Whether the next `get()` will recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Identity readers track this computed under.
    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    /// Detach from dependencies. The cached value is kept and returned
    /// by later reads without recomputation.
    pub fn stop(&self) {
        self.inner.effect.stop();
        self.inner.dirty.set(false);
    }
}

// =============================================================================
// Watch
// =============================================================================

/// Options for [`Runtime::watch`].
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    /// Invoke the callback once on creation (with no previous value).
    pub immediate: bool,
}

impl Runtime {
    /// Observe `source`; when anything it read changes, re-run it and call
    /// `callback(new, old)` if the result differs.
    ///
    /// Returns the underlying effect; stop it to end the watch.
    pub fn watch<T, S, C>(&self, source: S, callback: C, options: WatchOptions) -> Effect<T>
    where
        T: Clone + PartialEq + 'static,
        S: FnMut() -> T + 'static,
        C: FnMut(&T, Option<&T>) + 'static,
    {
        let slot: Rc<RefCell<Option<Effect<T>>>> = Rc::new(RefCell::new(None));
        let previous: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
        let callback = Rc::new(RefCell::new(callback));

        let job: Rc<dyn Fn(bool)> = {
            let slot = Rc::clone(&slot);
            let previous = Rc::clone(&previous);
            Rc::new(move |force: bool| {
                let Some(effect) = slot.borrow().clone() else {
                    return;
                };
                let Some(next) = effect.run() else {
                    return;
                };
                let old = previous.borrow_mut().replace(next.clone());
                if !force && old.as_ref() == Some(&next) {
                    return;
                }
                match callback.try_borrow_mut() {
                    Ok(mut callback) => callback(&next, old.as_ref()),
                    Err(_) => warn!("watch callback re-entered; skipping"),
                }
            })
        };

        let on_change = Rc::clone(&job);
        let effect = self.effect_with(
            source,
            EffectOptions {
                lazy: true,
                scheduler: Some(Rc::new(move |_job: Job| on_change(false))),
                label: Some(Rc::from("watch")),
            },
        );
        *slot.borrow_mut() = Some(effect.clone());

        if options.immediate {
            job(true);
        } else {
            *previous.borrow_mut() = effect.run();
        }
        effect
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactivity::{RawObject, Value};

    #[test]
    fn test_computed_is_lazy_and_cached() {
        let rt = Runtime::new();
        let obj = rt.reactive(RawObject::map().with("foo", 1).with("bar", 2));
        let calls = Rc::new(Cell::new(0));

        let (o, c) = (obj.clone(), calls.clone());
        let sum = rt.computed(move || {
            c.set(c.get() + 1);
            o.get("foo").as_f64().unwrap_or(0.0) + o.get("bar").as_f64().unwrap_or(0.0)
        });
        assert_eq!(calls.get(), 0, "not evaluated before first read");

        assert_eq!(sum.get(), 3.0);
        assert_eq!(sum.get(), 3.0);
        assert_eq!(calls.get(), 1);

        obj.set("foo", 2);
        assert!(sum.is_dirty());
        assert_eq!(calls.get(), 1, "dirty marking doesn't recompute");
        assert_eq!(sum.get(), 4.0);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_effect_reading_computed_reruns() {
        let rt = Runtime::new();
        let obj = rt.reactive(RawObject::map().with("foo", 1));
        let o = obj.clone();
        let doubled = rt.computed(move || o.get("foo").as_f64().unwrap_or(0.0) * 2.0);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let (d, s) = (doubled.clone(), seen.clone());
        let _effect = rt.effect(move || s.borrow_mut().push(d.get()));

        obj.set("foo", 5);
        obj.set("foo", 6);
        assert_eq!(&*seen.borrow(), &[2.0, 10.0, 12.0]);
    }

    #[test]
    fn test_stopped_computed_keeps_value() {
        let rt = Runtime::new();
        let obj = rt.reactive(RawObject::map().with("n", 1));
        let o = obj.clone();
        let value = rt.computed(move || o.get("n"));

        assert_eq!(value.get(), Value::from(1));
        value.stop();
        obj.set("n", 2);
        assert_eq!(value.get(), Value::from(1));
    }

    #[test]
    fn test_watch_reports_new_and_old() {
        let rt = Runtime::new();
        let obj = rt.reactive(RawObject::map().with("n", 1));
        let log = Rc::new(RefCell::new(Vec::new()));

        let (o, l) = (obj.clone(), log.clone());
        let _watch = rt.watch(
            move || o.get("n"),
            move |new: &Value, old: Option<&Value>| {
                l.borrow_mut().push((new.clone(), old.cloned()));
            },
            WatchOptions::default(),
        );
        assert!(log.borrow().is_empty());

        obj.set("n", 2);
        assert_eq!(&*log.borrow(), &[(Value::from(2), Some(Value::from(1)))]);
    }

    #[test]
    fn test_watch_immediate_and_stop() {
        let rt = Runtime::new();
        let obj = rt.reactive(RawObject::map().with("n", 1));
        let calls = Rc::new(Cell::new(0));

        let (o, c) = (obj.clone(), calls.clone());
        let watch = rt.watch(
            move || o.get("n"),
            move |_: &Value, old: Option<&Value>| {
                if c.get() == 0 {
                    assert!(old.is_none());
                }
                c.set(c.get() + 1);
            },
            WatchOptions { immediate: true },
        );
        assert_eq!(calls.get(), 1);

        watch.stop();
        obj.set("n", 3);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_watch_computed_source() {
        let rt = Runtime::new();
        let obj = rt.reactive(RawObject::map().with("n", 1));
        let o = obj.clone();
        let parity = rt.computed(move || o.get("n").as_f64().unwrap_or(0.0) as i64 % 2);
        let changes = Rc::new(Cell::new(0));

        let (p, c) = (parity.clone(), changes.clone());
        let _watch = rt.watch(
            move || p.get(),
            move |_: &i64, _: Option<&i64>| c.set(c.get() + 1),
            WatchOptions::default(),
        );

        obj.set("n", 3);
        assert_eq!(changes.get(), 0, "parity unchanged");
        obj.set("n", 4);
        assert_eq!(changes.get(), 1);
    }
}
