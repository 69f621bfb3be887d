//! Contexts handed to component code.
//!
//! - [`SetupContext`] - given to `setup`: attrs, emit, slots, and lifecycle
//!   registration
//! - [`RenderContext`] - given to `render` and hooks: one namespace over
//!   state, props and setup state
//!
//! # Lookup Order
//!
//! `RenderContext::get` resolves a key against state, then props, then setup
//! state. `set` writes state or setup state; props are read-only.

use std::rc::Rc;

use tracing::warn;

use super::instance::{ComponentInstance, LifecycleHook};
use crate::reactivity::{RawObject, Reactive, Runtime, Value};
use crate::renderer::VNode;

// =============================================================================
// Render Context
// =============================================================================

#[derive(Clone)]
pub struct RenderContext {
    instance: Rc<ComponentInstance>,
    runtime: Runtime,
}

impl RenderContext {
    pub(crate) fn new(instance: Rc<ComponentInstance>, runtime: Runtime) -> Self {
        Self { instance, runtime }
    }

    /// Read `key` from state, props or setup state (tracked).
    pub fn get(&self, key: &str) -> Value {
        let instance = &self.instance;
        if instance.state().has(key) {
            return instance.state().get(key);
        }
        let props = instance.props();
        if props.has(key) {
            return props.get(key);
        }
        if let Some(setup) = instance.setup_state() {
            if setup.has(key) {
                return setup.get(key);
            }
        }
        warn!(component = instance.name(), key, "read of unknown key in render context");
        Value::Undefined
    }

    /// Write `key` to state or setup state. Returns false if refused.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        let instance = &self.instance;
        let state = instance.state();
        if state.raw().contains_key(key) {
            return state.set(key, value);
        }
        if instance.props().raw().contains_key(key) {
            warn!(component = instance.name(), key, "props are read-only");
            return false;
        }
        if let Some(setup) = instance.setup_state() {
            if setup.raw().contains_key(key) {
                return setup.set(key, value);
            }
        }
        warn!(component = instance.name(), key, "write to unknown key in render context");
        false
    }

    /// Invoke a function-valued entry.
    pub fn call(&self, key: &str, args: &[Value]) -> Value {
        match self.get(key).as_callback() {
            Some(f) => f.call(args),
            None => {
                warn!(component = self.instance.name(), key, "entry is not callable");
                Value::Undefined
            }
        }
    }

    /// Render a slot passed by the parent.
    pub fn slot(&self, name: &str) -> Option<VNode> {
        self.instance.render_slot(name)
    }

    pub fn emit(&self, event: &str, args: &[Value]) -> bool {
        self.instance.emit(event, args)
    }

    pub fn state(&self) -> &Reactive {
        self.instance.state()
    }

    pub fn props(&self) -> Reactive {
        self.instance.props()
    }

    pub fn attrs(&self) -> RawObject {
        self.instance.attrs()
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn instance(&self) -> &Rc<ComponentInstance> {
        &self.instance
    }
}

// =============================================================================
// Setup Context
// =============================================================================

pub struct SetupContext {
    instance: Rc<ComponentInstance>,
    runtime: Runtime,
}

impl SetupContext {
    pub(crate) fn new(instance: Rc<ComponentInstance>, runtime: Runtime) -> Self {
        Self { instance, runtime }
    }

    /// Runtime for creating state, computed values and watchers.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn attrs(&self) -> RawObject {
        self.instance.attrs()
    }

    pub fn emit(&self, event: &str, args: &[Value]) -> bool {
        self.instance.emit(event, args)
    }

    /// A cloneable emitter for use in event handlers.
    pub fn emitter(&self) -> Emitter {
        Emitter {
            instance: Rc::downgrade(&self.instance),
        }
    }

    pub fn slot(&self, name: &str) -> Option<VNode> {
        self.instance.render_slot(name)
    }

    pub fn slot_names(&self) -> Vec<Rc<str>> {
        self.instance.slot_names()
    }

    pub fn on_before_mount(&self, f: impl Fn() + 'static) {
        self.register(LifecycleHook::BeforeMount, f);
    }

    pub fn on_mounted(&self, f: impl Fn() + 'static) {
        self.register(LifecycleHook::Mounted, f);
    }

    pub fn on_before_update(&self, f: impl Fn() + 'static) {
        self.register(LifecycleHook::BeforeUpdate, f);
    }

    pub fn on_updated(&self, f: impl Fn() + 'static) {
        self.register(LifecycleHook::Updated, f);
    }

    pub fn on_before_unmount(&self, f: impl Fn() + 'static) {
        self.register(LifecycleHook::BeforeUnmount, f);
    }

    pub fn on_unmounted(&self, f: impl Fn() + 'static) {
        self.register(LifecycleHook::Unmounted, f);
    }

    fn register(&self, kind: LifecycleHook, f: impl Fn() + 'static) {
        self.instance
            .register_hook(kind, Rc::new(move |_: &RenderContext| f()));
    }
}

/// Emits events on behalf of an instance without keeping it alive.
#[derive(Clone)]
pub struct Emitter {
    instance: std::rc::Weak<ComponentInstance>,
}

impl Emitter {
    /// Returns false if the instance is gone or no handler was passed.
    pub fn emit(&self, event: &str, args: &[Value]) -> bool {
        self.instance
            .upgrade()
            .is_some_and(|instance| instance.emit(event, args))
    }
}
