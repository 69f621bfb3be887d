//! Components - Stateful units with their own render effect.
//!
//! - [`options`] - Component definitions
//! - [`instance`] - Live instances, props resolution, emit
//! - [`context`] - The setup and render contexts
//! - [`lifecycle`] - Mount, update and teardown inside the renderer
//!
//! A component re-renders itself: its render function runs inside an
//! effect scheduled on the runtime's job queue, so any number of state
//! changes before [`Renderer::flush`](crate::renderer::Renderer::flush)
//! produce one update.

pub mod context;
pub mod instance;
pub mod lifecycle;
pub mod options;

pub use context::{Emitter, RenderContext, SetupContext};
pub use instance::{
    ComponentInstance, InstanceId, LifecycleHook, handler_name, has_props_changed, resolve_props,
};
pub use options::{ComponentOptions, Hook, RenderFn, SetupFn, SetupResult};
