//! Component instances.
//!
//! An instance is the live half of a component node: its reactive state,
//! shallow-reactive props, attrs, registered hooks and last rendered
//! subtree. Instances live in the renderer's arena under an [`InstanceId`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::warn;

use super::context::RenderContext;
use super::options::{ComponentOptions, Hook, RenderFn};
use crate::reactivity::{Effect, RawObject, Reactive, Runtime, Value};
use crate::renderer::{NodeHandle, Props, Slots, VNode};

/// Handle of a live component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleHook {
    Created,
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    BeforeUnmount,
    Unmounted,
}

impl LifecycleHook {
    const ALL: [LifecycleHook; 7] = [
        LifecycleHook::Created,
        LifecycleHook::BeforeMount,
        LifecycleHook::Mounted,
        LifecycleHook::BeforeUpdate,
        LifecycleHook::Updated,
        LifecycleHook::BeforeUnmount,
        LifecycleHook::Unmounted,
    ];

    fn from_options(self, options: &ComponentOptions) -> Option<&Hook> {
        match self {
            LifecycleHook::Created => options.created.as_ref(),
            LifecycleHook::BeforeMount => options.before_mount.as_ref(),
            LifecycleHook::Mounted => options.mounted.as_ref(),
            LifecycleHook::BeforeUpdate => options.before_update.as_ref(),
            LifecycleHook::Updated => options.updated.as_ref(),
            LifecycleHook::BeforeUnmount => options.before_unmount.as_ref(),
            LifecycleHook::Unmounted => options.unmounted.as_ref(),
        }
    }
}

/// Hooks per lifecycle point: the definition's own first, then any
/// registered from `setup` in registration order.
#[derive(Default)]
struct LifecycleHooks {
    hooks: Vec<(LifecycleHook, Hook)>,
}

impl LifecycleHooks {
    fn from_options(options: &ComponentOptions) -> Self {
        let hooks = LifecycleHook::ALL
            .iter()
            .filter_map(|&kind| kind.from_options(options).map(|hook| (kind, hook.clone())))
            .collect();
        Self { hooks }
    }

    fn get(&self, kind: LifecycleHook) -> Vec<Hook> {
        self.hooks
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, hook)| hook.clone())
            .collect()
    }
}

// =============================================================================
// Instance
// =============================================================================

pub struct ComponentInstance {
    id: InstanceId,
    options: Rc<ComponentOptions>,
    state: Reactive,
    props: Reactive,
    attrs: RefCell<RawObject>,
    setup_state: RefCell<Option<Reactive>>,
    slots: RefCell<Slots>,
    render: RefCell<Option<RenderFn>>,
    hooks: RefCell<LifecycleHooks>,
    is_mounted: Cell<bool>,
    subtree: RefCell<Option<VNode>>,
    vnode: RefCell<VNode>,
    effect: RefCell<Option<Effect<()>>>,
    container: Cell<NodeHandle>,
    anchor: Cell<Option<NodeHandle>>,
}

pub(crate) struct InstanceInit {
    pub(crate) id: InstanceId,
    pub(crate) options: Rc<ComponentOptions>,
    pub(crate) state: Reactive,
    pub(crate) props: Reactive,
    pub(crate) attrs: RawObject,
    pub(crate) vnode: VNode,
    pub(crate) container: NodeHandle,
    pub(crate) anchor: Option<NodeHandle>,
}

impl ComponentInstance {
    pub(crate) fn new(init: InstanceInit) -> Self {
        let slots = slots_of(&init.vnode);
        Self {
            id: init.id,
            hooks: RefCell::new(LifecycleHooks::from_options(&init.options)),
            render: RefCell::new(init.options.render.clone()),
            options: init.options,
            state: init.state,
            props: init.props,
            attrs: RefCell::new(init.attrs),
            setup_state: RefCell::new(None),
            slots: RefCell::new(slots),
            is_mounted: Cell::new(false),
            subtree: RefCell::new(None),
            vnode: RefCell::new(init.vnode),
            effect: RefCell::new(None),
            container: Cell::new(init.container),
            anchor: Cell::new(init.anchor),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.options.display_name()
    }

    pub fn options(&self) -> &Rc<ComponentOptions> {
        &self.options
    }

    /// Deeply reactive state from `data()`.
    pub fn state(&self) -> &Reactive {
        &self.state
    }

    /// Resolved props, read-only from the component's side.
    pub fn props(&self) -> Reactive {
        self.props.readonly_view()
    }

    /// Writable props, for the renderer's updates.
    pub(crate) fn props_mut(&self) -> &Reactive {
        &self.props
    }

    /// Props passed in but not declared.
    pub fn attrs(&self) -> RawObject {
        self.attrs.borrow().clone()
    }

    pub(crate) fn set_attrs(&self, attrs: RawObject) {
        *self.attrs.borrow_mut() = attrs;
    }

    pub fn setup_state(&self) -> Option<Reactive> {
        self.setup_state.borrow().clone()
    }

    pub(crate) fn set_setup_state(&self, state: Reactive) {
        *self.setup_state.borrow_mut() = Some(state);
    }

    pub fn is_mounted(&self) -> bool {
        self.is_mounted.get()
    }

    pub(crate) fn set_mounted(&self, mounted: bool) {
        self.is_mounted.set(mounted);
    }

    /// Last rendered subtree.
    pub fn subtree(&self) -> Option<VNode> {
        self.subtree.borrow().clone()
    }

    pub(crate) fn set_subtree(&self, subtree: Option<VNode>) -> Option<VNode> {
        std::mem::replace(&mut *self.subtree.borrow_mut(), subtree)
    }

    /// The component node currently representing this instance.
    pub fn vnode(&self) -> VNode {
        self.vnode.borrow().clone()
    }

    pub(crate) fn set_vnode(&self, vnode: VNode) {
        *self.slots.borrow_mut() = slots_of(&vnode);
        *self.vnode.borrow_mut() = vnode;
    }

    pub(crate) fn render_fn(&self) -> Option<RenderFn> {
        self.render.borrow().clone()
    }

    pub(crate) fn set_render_fn(&self, render: RenderFn) {
        *self.render.borrow_mut() = Some(render);
    }

    pub(crate) fn effect(&self) -> Option<Effect<()>> {
        self.effect.borrow().clone()
    }

    pub(crate) fn set_effect(&self, effect: Effect<()>) {
        *self.effect.borrow_mut() = Some(effect);
    }

    pub(crate) fn container(&self) -> NodeHandle {
        self.container.get()
    }

    pub(crate) fn anchor(&self) -> Option<NodeHandle> {
        self.anchor.get()
    }

    // -------------------------------------------------------------------------
    // Slots, emit, hooks
    // -------------------------------------------------------------------------

    pub fn slot_names(&self) -> Vec<Rc<str>> {
        self.slots.borrow().keys().cloned().collect()
    }

    /// Render the named slot.
    pub fn render_slot(&self, name: &str) -> Option<VNode> {
        let slot = self.slots.borrow().get(name).cloned();
        match slot {
            Some(slot) => Some(slot()),
            None => {
                warn!(component = self.name(), slot = name, "slot not provided");
                None
            }
        }
    }

    /// Call the `on<Event>` handler from props with `args`.
    ///
    /// Returns false (and warns) when no handler was passed.
    pub fn emit(&self, event: &str, args: &[Value]) -> bool {
        let handler_name = handler_name(event);
        let handler = self.props.raw().get(&handler_name);
        match handler.as_callback() {
            Some(handler) => {
                handler.call(args);
                true
            }
            None => {
                warn!(
                    component = self.name(),
                    handler = %handler_name,
                    "no handler for emitted event"
                );
                false
            }
        }
    }

    pub(crate) fn register_hook(&self, kind: LifecycleHook, hook: Hook) {
        self.hooks.borrow_mut().hooks.push((kind, hook));
    }

    /// Run every hook for `kind`, untracked.
    pub(crate) fn call_hook(&self, kind: LifecycleHook, ctx: &RenderContext, runtime: &Runtime) {
        let hooks = self.hooks.borrow().get(kind);
        if hooks.is_empty() {
            return;
        }
        runtime.untracked(|| {
            for hook in hooks {
                hook(ctx);
            }
        });
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("is_mounted", &self.is_mounted.get())
            .finish()
    }
}

fn slots_of(vnode: &VNode) -> Slots {
    match vnode.children() {
        crate::renderer::Children::Slots(slots) => slots.clone(),
        _ => Slots::new(),
    }
}

// =============================================================================
// Props
// =============================================================================

/// `change` → `onChange`.
pub fn handler_name(event: &str) -> String {
    let mut chars = event.chars();
    match chars.next() {
        Some(first) => format!("on{}{}", first.to_uppercase(), chars.as_str()),
        None => "on".to_string(),
    }
}

/// Split passed props into declared props (plus every `on*` handler) and
/// attrs.
pub fn resolve_props(options: &ComponentOptions, passed: &Props) -> (RawObject, RawObject) {
    let props = RawObject::map();
    let attrs = RawObject::map();
    for (key, value) in passed {
        if options.declares(key) || key.starts_with("on") {
            props.insert(key, value.clone());
        } else {
            attrs.insert(key, value.clone());
        }
    }
    (props, attrs)
}

/// Key count differs, or some key maps to a different value.
pub fn has_props_changed(prev: &Props, next: &Props) -> bool {
    if prev.len() != next.len() {
        return true;
    }
    next.iter()
        .any(|(key, value)| prev.get(key).is_none_or(|old| !old.same_value(value)))
}
