//! Reactive Runtime - Effect registration, tracking and triggering.
//!
//! A [`Runtime`] owns one reactive root:
//! - the dependency store (object, key → effects)
//! - the effect arena (body, scheduler, current memberships)
//! - the effect stack (which effect is reading right now)
//! - the job queue used for batched re-runs
//!
//! # Effect Runs
//!
//! Every run of an effect:
//! 1. Drops all memberships recorded by the previous run
//! 2. Pushes the effect on the stack
//! 3. Runs the body (reads call [`Runtime::track`])
//! 4. Pops the stack, even if the body panicked
//!
//! Step 1 keeps subscriptions exact: a branch not taken on this run no
//! longer re-runs the effect. The stack restores the enclosing effect when
//! a nested effect returns.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexSet;
use tracing::{trace, warn};

use super::scheduler::JobQueue;
use super::store::{DepStore, Key, TriggerKind};
use super::value::ObjectId;

// =============================================================================
// Configuration
// =============================================================================

/// Tuning knobs for a [`Runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Maximum runs of one effect within a single flush before it is
    /// dropped as a probable update cycle.
    pub max_recursion: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { max_recursion: 100 }
    }
}

// =============================================================================
// Effect Types
// =============================================================================

/// Handle of a registered effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(pub(crate) u64);

/// Custom scheduling policy: receives the job instead of the effect
/// running synchronously.
pub type Scheduler = Rc<dyn Fn(Job)>;

/// Options for [`Runtime::effect_with`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Don't run on creation; the caller runs it via [`Effect::run`].
    pub lazy: bool,
    /// Scheduler used when a dependency changes.
    pub scheduler: Option<Scheduler>,
    /// Name shown in diagnostics.
    pub label: Option<Rc<str>>,
}

struct EffectSlot {
    runner: Rc<dyn Fn()>,
    scheduler: Option<Scheduler>,
    deps: Vec<(ObjectId, Key)>,
    label: Option<Rc<str>>,
}

/// A pending re-run of an effect, handed to schedulers.
#[derive(Clone)]
pub struct Job {
    id: EffectId,
    runtime: Weak<RuntimeInner>,
}

impl Job {
    pub fn id(&self) -> EffectId {
        self.id
    }

    /// Run the effect now, if it is still registered.
    pub fn run(&self) {
        if let Some(inner) = self.runtime.upgrade() {
            inner.run_direct(self.id);
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("id", &self.id).finish()
    }
}

type Body<T> = Rc<RefCell<Box<dyn FnMut() -> T>>>;

/// Handle to a registered effect.
///
/// Dropping the handle does not stop the effect; call [`Effect::stop`].
pub struct Effect<T> {
    id: EffectId,
    runtime: Weak<RuntimeInner>,
    body: Body<T>,
}

impl<T> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            runtime: self.runtime.clone(),
            body: Rc::clone(&self.body),
        }
    }
}

impl<T> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect").field("id", &self.id).finish()
    }
}

impl<T: 'static> Effect<T> {
    pub fn id(&self) -> EffectId {
        self.id
    }

    /// Re-run the body, re-binding dependencies, and return its result.
    ///
    /// Returns `None` if the effect is already running further up the
    /// stack (re-entry is refused). A stopped effect runs untracked.
    pub fn run(&self) -> Option<T> {
        match self.runtime.upgrade() {
            Some(inner) => run_effect(&inner, self.id, &self.body),
            None => self.body.try_borrow_mut().ok().map(|mut body| body()),
        }
    }

    /// Request a run through the effect's scheduler, as if a dependency
    /// changed.
    pub fn schedule(&self) {
        if let Some(inner) = self.runtime.upgrade() {
            inner.schedule(self.id);
        }
    }

    /// Dispose the effect: drop its dependencies and any queued run.
    pub fn stop(&self) {
        if let Some(inner) = self.runtime.upgrade() {
            inner.stop(self.id);
        }
    }

    /// Whether the effect is still registered.
    pub fn is_active(&self) -> bool {
        self.runtime
            .upgrade()
            .is_some_and(|inner| inner.effects.borrow().contains_key(&self.id))
    }
}

fn run_effect<T>(inner: &Rc<RuntimeInner>, id: EffectId, body: &Body<T>) -> Option<T> {
    if inner.is_running(id) {
        warn!(
            effect = ?id,
            label = ?inner.label(id),
            "effect re-entered while running; skipping nested run"
        );
        return None;
    }
    let Ok(mut body) = body.try_borrow_mut() else {
        warn!(effect = ?id, "effect body is busy; skipping run");
        return None;
    };
    let active = inner.effects.borrow().contains_key(&id);
    if active {
        inner.cleanup(id);
    }
    inner.stack.borrow_mut().push(active.then_some(id));
    scopeguard::defer! {
        inner.stack.borrow_mut().pop();
    }
    Some(body())
}

// =============================================================================
// Runtime
// =============================================================================

pub(crate) struct RuntimeInner {
    config: RuntimeConfig,
    store: RefCell<DepStore>,
    effects: RefCell<HashMap<EffectId, EffectSlot>>,
    /// `None` entries pause tracking (see [`Runtime::untracked`]).
    stack: RefCell<Vec<Option<EffectId>>>,
    next_effect: Cell<u64>,
    pub(crate) queue: RefCell<JobQueue>,
}

impl RuntimeInner {
    /// Effect that reads should be attributed to.
    fn active_effect(&self) -> Option<EffectId> {
        self.stack.borrow().last().copied().flatten()
    }

    /// Innermost effect currently executing, tracked or not.
    fn running_effect(&self) -> Option<EffectId> {
        self.stack.borrow().iter().rev().find_map(|entry| *entry)
    }

    fn is_running(&self, id: EffectId) -> bool {
        self.stack.borrow().contains(&Some(id))
    }

    fn label(&self, id: EffectId) -> Option<Rc<str>> {
        self.effects.borrow().get(&id).and_then(|slot| slot.label.clone())
    }

    fn cleanup(&self, id: EffectId) {
        let deps = match self.effects.borrow_mut().get_mut(&id) {
            Some(slot) => std::mem::take(&mut slot.deps),
            None => return,
        };
        let mut store = self.store.borrow_mut();
        for (target, key) in deps {
            store.remove(target, &key, id);
        }
    }

    fn stop(&self, id: EffectId) {
        self.cleanup(id);
        let removed = self.effects.borrow_mut().remove(&id);
        self.queue.borrow_mut().remove(id);
        if removed.is_some() {
            trace!(effect = ?id, "effect stopped");
        }
    }

    /// Run an effect's body, bypassing its scheduler.
    pub(crate) fn run_direct(&self, id: EffectId) {
        let runner = self.effects.borrow().get(&id).map(|slot| Rc::clone(&slot.runner));
        if let Some(runner) = runner {
            runner();
        }
    }

    /// Run an effect through its scheduler, or synchronously if it has none.
    fn schedule(self: &Rc<Self>, id: EffectId) {
        let entry = self
            .effects
            .borrow()
            .get(&id)
            .map(|slot| (Rc::clone(&slot.runner), slot.scheduler.clone()));
        let Some((runner, scheduler)) = entry else {
            return;
        };
        match scheduler {
            Some(scheduler) => scheduler(Job {
                id,
                runtime: Rc::downgrade(self),
            }),
            None => runner(),
        }
    }
}

/// An independent reactive root.
///
/// Cloning a `Runtime` creates a new handle to the **same** root.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Rc<RuntimeInner>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("effects", &self.inner.effects.borrow().len())
            .field("stack_depth", &self.inner.stack.borrow().len())
            .finish()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                store: RefCell::new(DepStore::new()),
                effects: RefCell::new(HashMap::new()),
                stack: RefCell::new(Vec::new()),
                next_effect: Cell::new(1),
                queue: RefCell::new(JobQueue::default()),
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub(crate) fn downgrade(&self) -> Weak<RuntimeInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Rc<RuntimeInner>) -> Self {
        Self { inner }
    }

    // -------------------------------------------------------------------------
    // Effects
    // -------------------------------------------------------------------------

    /// Register an effect that runs now and re-runs synchronously whenever
    /// something it read changes.
    pub fn effect<T: 'static>(&self, body: impl FnMut() -> T + 'static) -> Effect<T> {
        self.effect_with(body, EffectOptions::default())
    }

    /// Register an effect with explicit options.
    pub fn effect_with<T: 'static>(
        &self,
        body: impl FnMut() -> T + 'static,
        options: EffectOptions,
    ) -> Effect<T> {
        let id = EffectId(self.inner.next_effect.get());
        self.inner.next_effect.set(id.0 + 1);

        let body: Body<T> = Rc::new(RefCell::new(Box::new(body)));
        let weak = Rc::downgrade(&self.inner);
        let runner_body = Rc::clone(&body);
        let runner: Rc<dyn Fn()> = Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                let _ = run_effect(&inner, id, &runner_body);
            }
        });

        self.inner.effects.borrow_mut().insert(
            id,
            EffectSlot {
                runner,
                scheduler: options.scheduler,
                deps: Vec::new(),
                label: options.label,
            },
        );

        let effect = Effect {
            id,
            runtime: Rc::downgrade(&self.inner),
            body,
        };
        if !options.lazy {
            let _ = effect.run();
        }
        effect
    }

    /// Dispose an effect by id.
    pub fn stop(&self, id: EffectId) {
        self.inner.stop(id);
    }

    /// Run `f` without attributing its reads to the running effect.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.stack.borrow_mut().push(None);
        scopeguard::defer! {
            self.inner.stack.borrow_mut().pop();
        }
        f()
    }

    /// The effect reads are currently attributed to.
    pub fn active_effect(&self) -> Option<EffectId> {
        self.inner.active_effect()
    }

    /// Number of registered (not stopped) effects.
    pub fn effect_count(&self) -> usize {
        self.inner.effects.borrow().len()
    }

    /// Number of (object, key) pairs the effect read on its last run.
    pub fn effect_dependencies(&self, id: EffectId) -> usize {
        self.inner
            .effects
            .borrow()
            .get(&id)
            .map_or(0, |slot| slot.deps.len())
    }

    /// Number of effects depending on (target, key).
    pub fn dependency_count(&self, target: ObjectId, key: &Key) -> usize {
        self.inner.store.borrow().dependents(target, key)
    }

    // -------------------------------------------------------------------------
    // Track / Trigger
    // -------------------------------------------------------------------------

    /// Record that the active effect read (target, key).
    ///
    /// No-op outside an effect or while tracking is paused.
    pub fn track(&self, target: ObjectId, key: Key) {
        let Some(id) = self.inner.active_effect() else {
            return;
        };
        let mut effects = self.inner.effects.borrow_mut();
        let Some(slot) = effects.get_mut(&id) else {
            return;
        };
        if self.inner.store.borrow_mut().add(target, key.clone(), id) {
            slot.deps.push((target, key));
        }
    }

    /// Run (or schedule) every effect depending on (target, key).
    ///
    /// Structural changes (`Add`/`Delete`) also reach effects that
    /// enumerated the object; adding a list index also reaches effects
    /// that read its length. The currently running effect is skipped.
    pub fn trigger(&self, target: ObjectId, key: Key, kind: TriggerKind) {
        self.trigger_keys(target, std::slice::from_ref(&key), kind);
    }

    pub(crate) fn trigger_keys(&self, target: ObjectId, keys: &[Key], kind: TriggerKind) {
        let changes: Vec<(Key, TriggerKind)> =
            keys.iter().map(|key| (key.clone(), kind)).collect();
        self.trigger_changes(target, &changes);
    }

    /// One trigger pass over several keys, each with its own kind. An effect
    /// depending on more than one of them is scheduled once.
    pub(crate) fn trigger_changes(&self, target: ObjectId, changes: &[(Key, TriggerKind)]) {
        let mut run_set = IndexSet::new();
        {
            let store = self.inner.store.borrow();
            let running = self.inner.running_effect();
            for (key, kind) in changes {
                store.collect(target, key, running, &mut run_set);
                if *kind == TriggerKind::Add && matches!(key, Key::Index(_)) {
                    store.collect(target, &Key::Length, running, &mut run_set);
                }
            }
            if changes.iter().any(|(_, kind)| kind.is_structural()) {
                store.collect(target, &Key::Iterate, running, &mut run_set);
            }
        }
        if run_set.is_empty() {
            return;
        }
        trace!(object = ?target, ?changes, effects = run_set.len(), "trigger");
        for id in run_set {
            self.inner.schedule(id);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_effect_runs_immediately_unless_lazy() {
        let rt = Runtime::new();
        let runs = Rc::new(Cell::new(0));

        let r = runs.clone();
        let _eager = rt.effect(move || r.set(r.get() + 1));
        assert_eq!(runs.get(), 1);

        let r = runs.clone();
        let lazy = rt.effect_with(
            move || r.set(r.get() + 1),
            EffectOptions {
                lazy: true,
                ..Default::default()
            },
        );
        assert_eq!(runs.get(), 1);
        lazy.run();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_run_returns_body_result() {
        let rt = Runtime::new();
        let effect = rt.effect(|| 42);
        assert_eq!(effect.run(), Some(42));
    }

    #[test]
    fn test_manual_track_and_trigger() {
        let rt = Runtime::new();
        let obj = ObjectId::next();
        let runs = Rc::new(Cell::new(0));

        let r = runs.clone();
        let rt2 = rt.clone();
        let effect = rt.effect(move || {
            rt2.track(obj, Key::from("a"));
            r.set(r.get() + 1);
        });
        assert_eq!(rt.dependency_count(obj, &Key::from("a")), 1);
        assert_eq!(rt.effect_dependencies(effect.id()), 1);

        rt.trigger(obj, Key::from("a"), TriggerKind::Set);
        assert_eq!(runs.get(), 2);

        rt.trigger(obj, Key::from("b"), TriggerKind::Set);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_track_outside_effect_is_noop() {
        let rt = Runtime::new();
        let obj = ObjectId::next();
        rt.track(obj, Key::from("a"));
        assert_eq!(rt.dependency_count(obj, &Key::from("a")), 0);
    }

    #[test]
    fn test_nested_effect_restores_parent() {
        let rt = Runtime::new();
        let obj = ObjectId::next();
        let outer_runs = Rc::new(Cell::new(0));

        let rt2 = rt.clone();
        let r = outer_runs.clone();
        let outer = rt.effect(move || {
            r.set(r.get() + 1);
            let rt3 = rt2.clone();
            let inner = rt2.effect(move || rt3.track(obj, Key::from("inner")));
            inner.stop();
            // Read after the nested effect returned must belong to the outer one.
            rt2.track(obj, Key::from("outer"));
        });

        assert_eq!(rt.effect_dependencies(outer.id()), 1);
        rt.trigger(obj, Key::from("outer"), TriggerKind::Set);
        assert_eq!(outer_runs.get(), 2);
    }

    #[test]
    fn test_stop_drops_dependencies() {
        let rt = Runtime::new();
        let obj = ObjectId::next();
        let rt2 = rt.clone();
        let effect = rt.effect(move || rt2.track(obj, Key::from("a")));
        effect.stop();
        assert!(!effect.is_active());
        assert_eq!(rt.dependency_count(obj, &Key::from("a")), 0);
    }

    #[test]
    fn test_untracked_reads_are_not_recorded() {
        let rt = Runtime::new();
        let obj = ObjectId::next();
        let rt2 = rt.clone();
        let effect = rt.effect(move || rt2.untracked(|| rt2.track(obj, Key::from("a"))));
        assert_eq!(rt.effect_dependencies(effect.id()), 0);
    }

    #[test]
    fn test_scheduler_receives_job() {
        let rt = Runtime::new();
        let obj = ObjectId::next();
        let scheduled = Rc::new(RefCell::new(Vec::new()));

        let s = scheduled.clone();
        let rt2 = rt.clone();
        let effect = rt.effect_with(
            move || rt2.track(obj, Key::from("a")),
            EffectOptions {
                scheduler: Some(Rc::new(move |job: Job| s.borrow_mut().push(job.id()))),
                ..Default::default()
            },
        );

        rt.trigger(obj, Key::from("a"), TriggerKind::Set);
        assert_eq!(&*scheduled.borrow(), &[effect.id()]);
    }

    #[test]
    fn test_reentry_is_refused() {
        let rt = Runtime::new();
        let slot: Rc<RefCell<Option<Effect<()>>>> = Rc::new(RefCell::new(None));
        let depth = Rc::new(Cell::new(0));

        let s = slot.clone();
        let d = depth.clone();
        let effect = rt.effect_with(
            move || {
                d.set(d.get() + 1);
                if let Some(me) = s.borrow().clone() {
                    assert!(me.run().is_none());
                }
            },
            EffectOptions {
                lazy: true,
                ..Default::default()
            },
        );
        *slot.borrow_mut() = Some(effect.clone());
        assert_eq!(effect.run(), Some(()));
        assert_eq!(depth.get(), 1);
    }
}
