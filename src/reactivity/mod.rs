//! Reactivity - Dependency tracking over plain dynamic data.
//!
//! ```text
//! Reactive::get ──track──► DepStore ◄──trigger── Reactive::set
//!                              │
//!                              ▼
//!                 effects (sync) / scheduler (job queue)
//! ```
//!
//! - [`value`] - Dynamic values and raw objects
//! - [`store`] - The (object, key) → effects map
//! - [`runtime`] - Effects, the effect stack, track/trigger
//! - [`scheduler`] - The deduplicated job queue
//! - [`reactive`] - Observed views with deep/shallow/readonly variants
//! - [`computed`] - Cached derived values and watchers

pub mod computed;
pub mod reactive;
pub mod runtime;
pub mod scheduler;
pub mod store;
pub mod value;

pub use computed::{Computed, WatchOptions};
pub use reactive::{Reactive, ReactiveFlags};
pub use runtime::{Effect, EffectId, EffectOptions, Job, Runtime, RuntimeConfig, Scheduler};
pub use store::{DepStore, Key, TriggerKind};
pub use value::{Callback, ObjectId, RawData, RawObject, Value};
