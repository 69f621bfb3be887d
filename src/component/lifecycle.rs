//! Component mount, update and teardown.
//!
//! # Mount Sequence
//!
//! 1. `before_create`
//! 2. State from `data()`, made deeply reactive
//! 3. Props split into props (declared + `on*`) and attrs
//! 4. Instance registered in the arena
//! 5. `setup` with read-only props
//! 6. `created`
//! 7. Render effect created on the job queue and run once:
//!    `before_mount` → mount subtree → `mounted`
//!
//! Later runs of the render effect (after flush) do
//! `before_update` → patch subtree → `updated`.
//!
//! # Teardown
//!
//! `before_unmount` → stop the render effect (dropping any queued run) →
//! unmount subtree → `unmounted` → remove from the arena.

use std::rc::Rc;

use tracing::{debug, warn};

use super::context::{RenderContext, SetupContext};
use super::instance::{
    ComponentInstance, InstanceId, InstanceInit, LifecycleHook, has_props_changed, resolve_props,
};
use super::options::SetupResult;
use crate::error::{RenderError, Result};
use crate::reactivity::{EffectOptions, RawObject};
use crate::renderer::patch::RendererInner;
use crate::renderer::{Host, NodeHandle, VNode};

impl<H: Host + 'static> RendererInner<H> {
    pub(crate) fn mount_component(
        self: &Rc<Self>,
        vnode: &VNode,
        container: NodeHandle,
        anchor: Option<NodeHandle>,
    ) -> Result<()> {
        let Some(options) = vnode.component_options().cloned() else {
            return Err(RenderError::NotMounted);
        };
        let runtime = self.runtime.clone();

        if let Some(before_create) = &options.before_create {
            runtime.untracked(|| before_create());
        }

        let data = runtime.untracked(|| {
            options
                .data
                .as_ref()
                .map_or_else(RawObject::map, |data| data())
        });
        let state = runtime.reactive(data);
        let (props, attrs) = resolve_props(&options, vnode.props());

        let id = self.next_instance_id();
        let instance = Rc::new(ComponentInstance::new(InstanceInit {
            id,
            options: Rc::clone(&options),
            state,
            props: runtime.shallow_reactive(props),
            attrs,
            vnode: vnode.clone(),
            container,
            anchor,
        }));
        self.instances.borrow_mut().insert(id, Rc::clone(&instance));
        vnode.set_component(Some(id));
        vnode.set_mounted(true);
        debug!(component = instance.name(), ?id, "mounting component");

        if let Some(setup) = &options.setup {
            let ctx = SetupContext::new(Rc::clone(&instance), runtime.clone());
            let props = instance.props();
            match runtime.untracked(|| setup(&props, &ctx)) {
                SetupResult::Render(render) => {
                    if options.render.is_some() {
                        warn!(
                            component = instance.name(),
                            "setup returned a render function; the component's render is ignored"
                        );
                    }
                    instance.set_render_fn(render);
                }
                SetupResult::State(state) => instance.set_setup_state(runtime.reactive(state)),
                SetupResult::None => {}
            }
        }

        let ctx = RenderContext::new(Rc::clone(&instance), runtime.clone());
        instance.call_hook(LifecycleHook::Created, &ctx, &runtime);

        let weak = Rc::downgrade(self);
        let effect = runtime.effect_with(
            move || {
                if let Some(renderer) = weak.upgrade() {
                    if let Err(error) = renderer.render_component(id) {
                        renderer.store_error(error);
                    }
                }
            },
            EffectOptions {
                lazy: true,
                scheduler: Some(runtime.queue_scheduler()),
                label: options.name.clone(),
            },
        );
        instance.set_effect(effect.clone());
        effect.run();
        self.take_error()
    }

    /// One run of a component's render effect.
    fn render_component(self: &Rc<Self>, id: InstanceId) -> Result<()> {
        let Some(instance) = self.instance(id) else {
            return Ok(());
        };
        let ctx = RenderContext::new(Rc::clone(&instance), self.runtime.clone());
        let subtree = match instance.render_fn() {
            Some(render) => render(&ctx),
            None => {
                warn!(component = instance.name(), "component has no render function");
                // Holds the component's place among its siblings.
                VNode::text("")
            }
        };

        self.runtime.untracked(|| -> Result<()> {
            if !instance.is_mounted() {
                instance.call_hook(LifecycleHook::BeforeMount, &ctx, &self.runtime);
                self.patch(None, &subtree, instance.container(), instance.anchor())?;
                instance.set_subtree(Some(subtree.clone()));
                instance.set_mounted(true);
                instance.vnode().set_el(self.first_host_node(&subtree));
                instance.call_hook(LifecycleHook::Mounted, &ctx, &self.runtime);
            } else {
                instance.call_hook(LifecycleHook::BeforeUpdate, &ctx, &self.runtime);
                let prev = instance.subtree();
                let container = prev
                    .as_ref()
                    .and_then(|prev| self.first_host_node(prev))
                    .and_then(|node| self.host.borrow().parent_node(node))
                    .unwrap_or_else(|| instance.container());
                let anchor = prev.as_ref().and_then(|prev| self.anchor_after(prev));
                self.patch(prev.as_ref(), &subtree, container, anchor)?;
                instance.set_subtree(Some(subtree.clone()));
                instance.vnode().set_el(self.first_host_node(&subtree));
                instance.call_hook(LifecycleHook::Updated, &ctx, &self.runtime);
            }
            Ok(())
        })
    }

    /// Reuse the instance of `n1` for `n2`, updating props and attrs if
    /// they changed. The instance's own effect re-renders it.
    pub(crate) fn patch_component(self: &Rc<Self>, n1: &VNode, n2: &VNode) -> Result<()> {
        let id = n1.instance_id().ok_or(RenderError::NotMounted)?;
        let instance = self.instance(id).ok_or(RenderError::NotMounted)?;
        n2.set_component(Some(id));
        n2.set_el(n1.el());
        let had_slots = !instance.slot_names().is_empty();
        instance.set_vnode(n2.clone());

        if has_props_changed(n1.props(), n2.props()) {
            let (next, attrs) = resolve_props(instance.options(), n2.props());
            let props = instance.props_mut();
            for (key, value) in next.entries() {
                props.set(key, value);
            }
            for key in props.raw().keys() {
                if !next.contains_key(&key) {
                    props.delete(key);
                }
            }
            instance.set_attrs(attrs);
        }

        // Slot content is opaque; re-render when any is passed.
        if had_slots || !instance.slot_names().is_empty() {
            if let Some(effect) = instance.effect() {
                effect.schedule();
            }
        }
        Ok(())
    }

    pub(crate) fn unmount_component(self: &Rc<Self>, vnode: &VNode, remove: bool) {
        let Some(instance) = vnode.instance_id().and_then(|id| self.instance(id)) else {
            return;
        };
        debug!(component = instance.name(), id = ?instance.id(), "unmounting component");
        let ctx = RenderContext::new(Rc::clone(&instance), self.runtime.clone());

        instance.call_hook(LifecycleHook::BeforeUnmount, &ctx, &self.runtime);
        if let Some(effect) = instance.effect() {
            effect.stop();
        }
        if let Some(subtree) = instance.set_subtree(None) {
            self.unmount_with(&subtree, remove);
        }
        instance.set_mounted(false);
        instance.call_hook(LifecycleHook::Unmounted, &ctx, &self.runtime);

        self.instances.borrow_mut().remove(&instance.id());
        vnode.set_component(None);
    }
}
