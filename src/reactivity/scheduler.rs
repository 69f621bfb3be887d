//! Job Queue - Batched, deduplicated effect re-runs.
//!
//! Effects created with [`Runtime::queue_scheduler`] don't re-run inside
//! `trigger`. Their jobs are collected in an insertion-ordered set, so any
//! number of mutations before the next flush collapse into one run per
//! effect. The host's event loop calls [`Runtime::flush_jobs`] once the
//! current turn of synchronous work is done.
//!
//! ```text
//! state.set("a", 1)  ─┐
//! state.set("b", 2)  ─┼─► queue {render}  ──flush_jobs()──► render runs once
//! state.set("a", 3)  ─┘
//! ```

use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexSet;
use tracing::{debug, warn};

use super::runtime::{EffectId, Job, Runtime, Scheduler};

/// Pending jobs plus the flush bookkeeping flags.
#[derive(Debug, Default)]
pub(crate) struct JobQueue {
    jobs: IndexSet<EffectId>,
    /// A flush has been requested and not yet performed.
    pending: bool,
    /// A flush is running right now.
    flushing: bool,
}

impl JobQueue {
    /// Enqueue; returns true if this request opened a new flush window.
    fn push(&mut self, id: EffectId) -> bool {
        self.jobs.insert(id);
        if self.pending {
            false
        } else {
            self.pending = true;
            true
        }
    }

    fn pop(&mut self) -> Option<EffectId> {
        self.jobs.shift_remove_index(0)
    }

    pub(crate) fn remove(&mut self, id: EffectId) {
        self.jobs.shift_remove(&id);
    }

    pub(crate) fn len(&self) -> usize {
        self.jobs.len()
    }
}

impl Runtime {
    /// Add a job to the queue. Repeated adds before a flush collapse.
    pub fn queue_job(&self, job: Job) {
        let opened = self.inner.queue.borrow_mut().push(job.id());
        if opened {
            debug!(effect = ?job.id(), "flush requested");
        }
    }

    /// A scheduler that routes jobs into this runtime's queue.
    pub fn queue_scheduler(&self) -> Scheduler {
        let weak = self.downgrade();
        Rc::new(move |job: Job| {
            if let Some(inner) = weak.upgrade() {
                Runtime::from_inner(inner).queue_job(job);
            }
        })
    }

    /// Whether a flush has been requested.
    pub fn has_pending_jobs(&self) -> bool {
        self.inner.queue.borrow().pending
    }

    /// Number of distinct jobs waiting.
    pub fn queued_jobs(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Drain the queue, running each job once.
    ///
    /// Jobs queued while flushing run in the same flush. A nested call
    /// while a flush is in progress returns immediately. Returns the
    /// number of jobs run.
    pub fn flush_jobs(&self) -> usize {
        {
            let mut queue = self.inner.queue.borrow_mut();
            if queue.flushing {
                return 0;
            }
            queue.flushing = true;
        }
        scopeguard::defer! {
            let mut queue = self.inner.queue.borrow_mut();
            queue.flushing = false;
            queue.pending = !queue.jobs.is_empty();
        }

        let limit = self.config().max_recursion;
        let mut counts: HashMap<EffectId, usize> = HashMap::new();
        let mut ran = 0;
        loop {
            let next = self.inner.queue.borrow_mut().pop();
            let Some(id) = next else {
                break;
            };
            let count = counts.entry(id).or_insert(0);
            *count += 1;
            if *count > limit {
                warn!(
                    effect = ?id,
                    limit,
                    "effect re-queued too many times in one flush; possible update cycle"
                );
                continue;
            }
            self.inner.run_direct(id);
            ran += 1;
        }
        if ran > 0 {
            debug!(jobs = ran, "flushed job queue");
        }
        ran
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactivity::{EffectOptions, Key, ObjectId, RuntimeConfig, TriggerKind};
    use std::cell::Cell;

    fn queued_effect(
        rt: &Runtime,
        obj: ObjectId,
        runs: Rc<Cell<usize>>,
    ) -> crate::reactivity::Effect<()> {
        let rt2 = rt.clone();
        rt.effect_with(
            move || {
                rt2.track(obj, Key::from("a"));
                runs.set(runs.get() + 1);
            },
            EffectOptions {
                scheduler: Some(rt.queue_scheduler()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_repeated_triggers_collapse() {
        let rt = Runtime::new();
        let obj = ObjectId::next();
        let runs = Rc::new(Cell::new(0));
        let _effect = queued_effect(&rt, obj, runs.clone());
        assert_eq!(runs.get(), 1);

        for _ in 0..3 {
            rt.trigger(obj, Key::from("a"), TriggerKind::Set);
        }
        assert_eq!(runs.get(), 1, "nothing runs before the flush");
        assert!(rt.has_pending_jobs());
        assert_eq!(rt.queued_jobs(), 1);

        assert_eq!(rt.flush_jobs(), 1);
        assert_eq!(runs.get(), 2);
        assert!(!rt.has_pending_jobs());
    }

    #[test]
    fn test_stopped_effect_leaves_queue() {
        let rt = Runtime::new();
        let obj = ObjectId::next();
        let runs = Rc::new(Cell::new(0));
        let effect = queued_effect(&rt, obj, runs.clone());

        rt.trigger(obj, Key::from("a"), TriggerKind::Set);
        effect.stop();
        assert_eq!(rt.flush_jobs(), 0);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_recursion_limit_breaks_cycles() {
        let rt = Runtime::with_config(RuntimeConfig { max_recursion: 5 });
        let obj = ObjectId::next();
        let runs_a = Rc::new(Cell::new(0));
        let runs_b = Rc::new(Cell::new(0));

        // A reads "a" and writes "b"; B reads "b" and writes "a".
        let ping_pong = |read: &'static str, write: &'static str, runs: Rc<Cell<usize>>| {
            let rt2 = rt.clone();
            rt.effect_with(
                move || {
                    rt2.track(obj, Key::from(read));
                    runs.set(runs.get() + 1);
                    rt2.trigger(obj, Key::from(write), TriggerKind::Set);
                },
                EffectOptions {
                    scheduler: Some(rt.queue_scheduler()),
                    ..Default::default()
                },
            )
        };
        let _a = ping_pong("a", "b", runs_a.clone());
        let _b = ping_pong("b", "a", runs_b.clone());

        rt.flush_jobs();
        assert_eq!(runs_a.get(), 6, "initial run plus the recursion limit");
        assert_eq!(runs_b.get(), 6);
        assert!(!rt.has_pending_jobs());
    }
}
