//! # spark-view
//!
//! Fine-grained reactivity and a keyed virtual-DOM renderer for Rust.
//!
//! ## Architecture
//!
//! Two engines, leaves first:
//!
//! ```text
//! reactive state ──track/trigger──► effects ──job queue──► component render
//!                                                               │
//!                          Host ◄── patch / keyed diff ◄── virtual tree
//! ```
//!
//! - State lives in [`Reactive`] views over plain [`RawObject`]s. Reads inside
//!   an effect subscribe it; writes re-run (or schedule) every subscriber.
//! - A [`Renderer`] diffs virtual trees and drives a [`Host`]. Components
//!   own a render effect on the runtime's job queue; the host loop calls
//!   [`Renderer::flush`] to apply batched updates.
//!
//! ## Modules
//!
//! - [`reactivity`] - Runtime, reactive objects, computed values, job queue
//! - [`renderer`] - Virtual nodes, patching, keyed reconciliation, hosts
//! - [`component`] - Component definitions, instances and lifecycle
//! - [`error`] - Render errors
//!
//! ## Example
//!
//! ```ignore
//! use spark_view::*;
//!
//! let rt = Runtime::new();
//! let mut host = MemoryHost::new();
//! let root = host.create_root("div");
//! let renderer = Renderer::new(&rt, host);
//!
//! let state = rt.reactive(RawObject::map().with("count", 0));
//! renderer.render(Some(&VNode::element("p").with_text("hi")), root)?;
//! ```

pub mod component;
pub mod error;
pub mod reactivity;
pub mod renderer;

pub use component::{
    ComponentInstance, ComponentOptions, Emitter, InstanceId, LifecycleHook, RenderContext,
    RenderFn, SetupContext, SetupFn, SetupResult,
};
pub use error::{RenderError, Result};
pub use reactivity::{
    Callback, Computed, Effect, EffectId, EffectOptions, Job, Key, ObjectId, RawObject, Reactive,
    ReactiveFlags, Runtime, RuntimeConfig, Scheduler, TriggerKind, Value, WatchOptions,
};
pub use renderer::{
    Children, Host, HostOp, MemoryHost, NodeHandle, Props, Renderer, RendererConfig, ShapeFlags,
    VKey, VNode, VNodeKind, normalize_class,
};
