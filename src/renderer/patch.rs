//! Renderer - Mount, patch and unmount virtual trees against a [`Host`].
//!
//! # Patch State Machine
//!
//! ```text
//! patch(old, new)
//!   old is new          → nothing
//!   kinds differ        → unmount old, mount new at old's position
//!   element             → mount | reuse node, diff props, patch children
//!   text                → mount | update text if changed
//!   fragment            → mount anchors + children | patch children
//!   component           → mount instance | update props, slots
//! ```
//!
//! Component instances and host nodes are addressed by handles; the renderer
//! keeps the instance arena and the root node rendered into each container.
//!
//! # Fragments
//!
//! A fragment is bracketed by two empty text nodes in its parent. Its
//! children are always mounted before the closing one, so a fragment (or a
//! component rendering one) keeps its place among siblings even while it
//! has no children.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::{debug, warn};

use super::host::{Host, NodeHandle};
use super::vnode::{Children, VNode, VNodeKind};
use crate::component::{ComponentInstance, InstanceId};
use crate::error::{RenderError, Result};
use crate::reactivity::Runtime;

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Reject children lists whose keys repeat.
    pub check_duplicate_keys: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            check_duplicate_keys: true,
        }
    }
}

// =============================================================================
// Renderer
// =============================================================================

pub(crate) struct RendererInner<H: Host> {
    pub(crate) runtime: Runtime,
    pub(crate) config: RendererConfig,
    pub(crate) host: RefCell<H>,
    roots: RefCell<HashMap<NodeHandle, VNode>>,
    pub(crate) instances: RefCell<HashMap<InstanceId, Rc<ComponentInstance>>>,
    next_instance: Cell<u64>,
    /// First error raised by a scheduled re-render since the last flush.
    pending_error: RefCell<Option<RenderError>>,
}

/// Renders virtual trees into a host.
///
/// Cloning creates a new handle to the **same** renderer.
pub struct Renderer<H: Host> {
    inner: Rc<RendererInner<H>>,
}

impl<H: Host> Clone for Renderer<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<H: Host + 'static> Renderer<H> {
    pub fn new(runtime: &Runtime, host: H) -> Self {
        Self::with_config(runtime, host, RendererConfig::default())
    }

    pub fn with_config(runtime: &Runtime, host: H, config: RendererConfig) -> Self {
        Self {
            inner: Rc::new(RendererInner {
                runtime: runtime.clone(),
                config,
                host: RefCell::new(host),
                roots: RefCell::new(HashMap::new()),
                instances: RefCell::new(HashMap::new()),
                next_instance: Cell::new(1),
                pending_error: RefCell::new(None),
            }),
        }
    }

    /// Render `vnode` into `container`, patching whatever was rendered there
    /// before. `None` unmounts the previous tree.
    ///
    /// Also returns any error left by a scheduled re-render.
    pub fn render(&self, vnode: Option<&VNode>, container: NodeHandle) -> Result<()> {
        let inner = &self.inner;
        if !inner.host.borrow().contains(container) {
            return Err(RenderError::UnknownNode { node: container });
        }
        let prev = inner.roots.borrow().get(&container).cloned();
        match vnode {
            Some(vnode) => {
                inner.patch(prev.as_ref(), vnode, container, None)?;
                inner.roots.borrow_mut().insert(container, vnode.clone());
            }
            None => {
                if let Some(prev) = prev {
                    inner.unmount(&prev);
                }
                inner.roots.borrow_mut().remove(&container);
            }
        }
        inner.take_error()
    }

    /// Run queued component updates. Returns the number of jobs run, or the
    /// first error one of them raised.
    pub fn flush(&self) -> Result<usize> {
        let ran = self.inner.runtime.flush_jobs();
        self.inner.take_error()?;
        Ok(ran)
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    pub fn config(&self) -> &RendererConfig {
        &self.inner.config
    }

    pub fn host(&self) -> Ref<'_, H> {
        self.inner.host.borrow()
    }

    pub fn host_mut(&self) -> RefMut<'_, H> {
        self.inner.host.borrow_mut()
    }

    /// Tree currently rendered into `container`.
    pub fn root(&self, container: NodeHandle) -> Option<VNode> {
        self.inner.roots.borrow().get(&container).cloned()
    }

    pub fn instance(&self, id: InstanceId) -> Option<Rc<ComponentInstance>> {
        self.inner.instances.borrow().get(&id).cloned()
    }

    /// Number of live component instances.
    pub fn instance_count(&self) -> usize {
        self.inner.instances.borrow().len()
    }
}

impl<H: Host + 'static> RendererInner<H> {
    pub(crate) fn next_instance_id(&self) -> InstanceId {
        let id = self.next_instance.get();
        self.next_instance.set(id + 1);
        InstanceId::new(id)
    }

    pub(crate) fn instance(&self, id: InstanceId) -> Option<Rc<ComponentInstance>> {
        self.instances.borrow().get(&id).cloned()
    }

    pub(crate) fn store_error(&self, error: RenderError) {
        warn!(%error, "render failed inside a scheduled update");
        let mut pending = self.pending_error.borrow_mut();
        if pending.is_none() {
            *pending = Some(error);
        }
    }

    pub(crate) fn take_error(&self) -> Result<()> {
        match self.pending_error.borrow_mut().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    // -------------------------------------------------------------------------
    // Patch
    // -------------------------------------------------------------------------

    pub(crate) fn patch(
        self: &Rc<Self>,
        n1: Option<&VNode>,
        n2: &VNode,
        container: NodeHandle,
        anchor: Option<NodeHandle>,
    ) -> Result<()> {
        if let Some(old) = n1 {
            if old.ptr_eq(n2) {
                return Ok(());
            }
        }
        if n2.is_mounted() {
            return Err(RenderError::AlreadyMounted);
        }
        if let Some(old) = n1 {
            if !old.same_kind(n2) {
                let anchor = self.anchor_after(old).or(anchor);
                debug!(old = ?old.kind(), new = ?n2.kind(), "node kind changed; replacing");
                self.unmount(old);
                return self.patch(None, n2, container, anchor);
            }
        }

        match n2.kind() {
            VNodeKind::Element(tag) => match n1 {
                None => self.mount_element(tag, n2, container, anchor)?,
                Some(old) => self.patch_element(old, n2)?,
            },
            VNodeKind::Text => self.process_text(n1, n2, container, anchor)?,
            VNodeKind::Fragment => match n1 {
                None => {
                    let end = {
                        let mut host = self.host.borrow_mut();
                        let start = host.create_text("");
                        let end = host.create_text("");
                        host.insert(start, container, anchor);
                        host.insert(end, container, anchor);
                        n2.set_el(Some(start));
                        n2.set_anchor(Some(end));
                        end
                    };
                    if let Children::Nodes(children) = n2.children() {
                        self.mount_children(children, container, Some(end))?;
                    }
                }
                Some(old) => {
                    n2.set_el(old.el());
                    n2.set_anchor(old.anchor());
                    self.patch_children(old, n2, container, old.anchor())?;
                }
            },
            VNodeKind::Component(_) => match n1 {
                None => return self.mount_component(n2, container, anchor),
                Some(old) => self.patch_component(old, n2)?,
            },
        }

        n2.set_mounted(true);
        if let Some(old) = n1 {
            old.set_mounted(false);
        }
        Ok(())
    }

    fn mount_element(
        self: &Rc<Self>,
        tag: &str,
        vnode: &VNode,
        container: NodeHandle,
        anchor: Option<NodeHandle>,
    ) -> Result<()> {
        let el = self.host.borrow_mut().create_element(tag);
        vnode.set_el(Some(el));

        match vnode.children() {
            Children::Text(text) => self.host.borrow_mut().set_element_text(el, text),
            Children::Nodes(children) => self.mount_children(children, el, None)?,
            Children::Slots(_) => warn!(tag, "slots passed to an element are ignored"),
            Children::None => {}
        }

        {
            let mut host = self.host.borrow_mut();
            for (key, value) in vnode.props() {
                host.patch_prop(el, key, None, Some(value));
            }
            host.insert(el, container, anchor);
        }
        Ok(())
    }

    fn patch_element(self: &Rc<Self>, n1: &VNode, n2: &VNode) -> Result<()> {
        let el = n1.el().ok_or(RenderError::NotMounted)?;
        n2.set_el(Some(el));

        {
            let mut host = self.host.borrow_mut();
            let (old_props, new_props) = (n1.props(), n2.props());
            for (key, next) in new_props {
                let prev = old_props.get(key);
                if prev.is_none_or(|prev| !prev.same_value(next)) {
                    host.patch_prop(el, key, prev, Some(next));
                }
            }
            for (key, prev) in old_props {
                if !new_props.contains_key(key) {
                    host.patch_prop(el, key, Some(prev), None);
                }
            }
        }

        self.patch_children(n1, n2, el, None)
    }

    fn process_text(
        &self,
        n1: Option<&VNode>,
        n2: &VNode,
        container: NodeHandle,
        anchor: Option<NodeHandle>,
    ) -> Result<()> {
        let text = n2.children().as_text().unwrap_or_default();
        let mut host = self.host.borrow_mut();
        match n1 {
            None => {
                let el = host.create_text(text);
                n2.set_el(Some(el));
                host.insert(el, container, anchor);
            }
            Some(old) => {
                let el = old.el().ok_or(RenderError::NotMounted)?;
                n2.set_el(Some(el));
                if old.children().as_text() != Some(text) {
                    host.set_text(el, text);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn mount_children(
        self: &Rc<Self>,
        children: &[VNode],
        container: NodeHandle,
        anchor: Option<NodeHandle>,
    ) -> Result<()> {
        self.check_keys(children)?;
        for child in children {
            self.patch(None, child, container, anchor)?;
        }
        Ok(())
    }

    pub(crate) fn check_keys(&self, children: &[VNode]) -> Result<()> {
        if !self.config.check_duplicate_keys {
            return Ok(());
        }
        let mut seen = HashSet::new();
        for key in children.iter().filter_map(VNode::key) {
            if !seen.insert(key) {
                return Err(RenderError::DuplicateKey { key: key.clone() });
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Unmount
    // -------------------------------------------------------------------------

    pub(crate) fn unmount(self: &Rc<Self>, vnode: &VNode) {
        self.unmount_with(vnode, true);
    }

    /// `remove: false` tears down components and state under a node whose
    /// host ancestor is being removed anyway.
    pub(crate) fn unmount_with(self: &Rc<Self>, vnode: &VNode, remove: bool) {
        match vnode.kind() {
            VNodeKind::Fragment => {
                if let Children::Nodes(children) = vnode.children() {
                    for child in children {
                        self.unmount_with(child, remove);
                    }
                }
                if remove {
                    let mut host = self.host.borrow_mut();
                    for node in [vnode.el(), vnode.anchor()].into_iter().flatten() {
                        host.remove(node);
                    }
                }
            }
            VNodeKind::Component(_) => self.unmount_component(vnode, remove),
            VNodeKind::Element(_) => {
                if let Children::Nodes(children) = vnode.children() {
                    for child in children {
                        self.unmount_with(child, false);
                    }
                }
                if remove {
                    if let Some(el) = vnode.el() {
                        self.host.borrow_mut().remove(el);
                    }
                }
            }
            VNodeKind::Text => {
                if remove {
                    if let Some(el) = vnode.el() {
                        self.host.borrow_mut().remove(el);
                    }
                }
            }
        }
        vnode.set_mounted(false);
    }

    // -------------------------------------------------------------------------
    // Host positions
    // -------------------------------------------------------------------------

    /// First host node a tree occupies, descending through components.
    pub(crate) fn first_host_node(&self, vnode: &VNode) -> Option<NodeHandle> {
        match vnode.kind() {
            VNodeKind::Element(_) | VNodeKind::Text | VNodeKind::Fragment => vnode.el(),
            VNodeKind::Component(_) => {
                let subtree = self.instance(vnode.instance_id()?)?.subtree()?;
                self.first_host_node(&subtree)
            }
        }
    }

    pub(crate) fn last_host_node(&self, vnode: &VNode) -> Option<NodeHandle> {
        match vnode.kind() {
            VNodeKind::Element(_) | VNodeKind::Text => vnode.el(),
            VNodeKind::Fragment => vnode.anchor(),
            VNodeKind::Component(_) => {
                let subtree = self.instance(vnode.instance_id()?)?.subtree()?;
                self.last_host_node(&subtree)
            }
        }
    }

    /// Host node following everything `vnode` occupies.
    pub(crate) fn anchor_after(&self, vnode: &VNode) -> Option<NodeHandle> {
        let last = self.last_host_node(vnode)?;
        self.host.borrow().next_sibling(last)
    }

    /// First host node at or after `from` in `nodes`, else `fallback`.
    pub(crate) fn anchor_at(
        &self,
        nodes: &[VNode],
        from: usize,
        fallback: Option<NodeHandle>,
    ) -> Option<NodeHandle> {
        nodes
            .get(from..)
            .and_then(|rest| rest.iter().find_map(|node| self.first_host_node(node)))
            .or(fallback)
    }

    /// Move every host node of `vnode` before `anchor`.
    pub(crate) fn move_vnode(
        &self,
        vnode: &VNode,
        container: NodeHandle,
        anchor: Option<NodeHandle>,
    ) {
        match vnode.kind() {
            VNodeKind::Element(_) | VNodeKind::Text => {
                if let Some(el) = vnode.el() {
                    self.host.borrow_mut().insert(el, container, anchor);
                }
            }
            VNodeKind::Fragment => {
                if let Some(start) = vnode.el() {
                    self.host.borrow_mut().insert(start, container, anchor);
                }
                if let Children::Nodes(children) = vnode.children() {
                    for child in children {
                        self.move_vnode(child, container, anchor);
                    }
                }
                if let Some(end) = vnode.anchor() {
                    self.host.borrow_mut().insert(end, container, anchor);
                }
            }
            VNodeKind::Component(_) => {
                let subtree = vnode
                    .instance_id()
                    .and_then(|id| self.instance(id))
                    .and_then(|instance| instance.subtree());
                if let Some(subtree) = subtree {
                    self.move_vnode(&subtree, container, anchor);
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactivity::{Callback, Value};
    use crate::renderer::{HostOp, MemoryHost};

    fn setup() -> (Renderer<MemoryHost>, NodeHandle) {
        let rt = Runtime::new();
        let mut host = MemoryHost::new();
        let root = host.create_root("div");
        (Renderer::new(&rt, host), root)
    }

    #[test]
    fn test_mount_element_with_props_and_children() {
        let (renderer, root) = setup();
        let tree = VNode::element("p")
            .with_prop("id", "greeting")
            .with_children(vec![VNode::text("hello "), VNode::element("b").with_text("world")]);

        renderer.render(Some(&tree), root).unwrap();
        assert_eq!(
            renderer.host().inner_html(root),
            "<p id=\"greeting\">hello <b>world</b></p>"
        );
        assert!(tree.is_mounted());
        assert!(tree.el().is_some());
    }

    #[test]
    fn test_patch_props_only_touches_changes() {
        let (renderer, root) = setup();
        let v1 = VNode::element("div").with_prop("id", "a").with_prop("title", "x");
        renderer.render(Some(&v1), root).unwrap();
        renderer.host_mut().clear_ops();

        let v2 = VNode::element("div").with_prop("id", "a").with_prop("lang", "en");
        renderer.render(Some(&v2), root).unwrap();

        let ops = renderer.host_mut().take_ops();
        let keys: Vec<&str> = ops
            .iter()
            .filter_map(|op| match op {
                HostOp::PatchProp { key, .. } => Some(&**key),
                _ => None,
            })
            .collect();
        assert_eq!(keys, vec!["lang", "title"]);
        assert_eq!(v2.el(), v1.el(), "element reused");
        assert_eq!(renderer.host().inner_html(root), "<div id=\"a\" lang=\"en\"></div>");
    }

    #[test]
    fn test_kind_change_replaces_in_place() {
        let (renderer, root) = setup();
        let v1 = VNode::element("div").with_children(vec![
            VNode::element("p").with_text("a"),
            VNode::element("span").with_text("b"),
            VNode::element("p").with_text("c"),
        ]);
        renderer.render(Some(&v1), root).unwrap();

        let v2 = VNode::element("div").with_children(vec![
            VNode::element("p").with_text("a"),
            VNode::element("em").with_text("B"),
            VNode::element("p").with_text("c"),
        ]);
        renderer.render(Some(&v2), root).unwrap();
        assert_eq!(
            renderer.host().inner_html(root),
            "<div><p>a</p><em>B</em><p>c</p></div>"
        );
    }

    #[test]
    fn test_text_node_updates_in_place() {
        let (renderer, root) = setup();
        let v1 = VNode::fragment(vec![VNode::text("one")]);
        renderer.render(Some(&v1), root).unwrap();
        renderer.host_mut().clear_ops();

        let v2 = VNode::fragment(vec![VNode::text("two")]);
        renderer.render(Some(&v2), root).unwrap();
        let ops = renderer.host_mut().take_ops();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], HostOp::SetText { text, .. } if text == "two"));
    }

    #[test]
    fn test_render_none_unmounts() {
        let (renderer, root) = setup();
        let tree = VNode::fragment(vec![VNode::element("a"), VNode::element("b")]);
        renderer.render(Some(&tree), root).unwrap();
        renderer.render(None, root).unwrap();
        assert_eq!(renderer.host().inner_html(root), "");
        assert!(renderer.root(root).is_none());
        assert!(!tree.is_mounted());
    }

    #[test]
    fn test_remounting_live_node_is_rejected() {
        let (renderer, root) = setup();
        let shared = VNode::element("li");
        let tree = VNode::element("ul").with_children(vec![shared.clone(), shared]);
        assert_eq!(
            renderer.render(Some(&tree), root),
            Err(RenderError::AlreadyMounted)
        );
    }

    #[test]
    fn test_patching_node_against_itself_is_noop() {
        let (renderer, root) = setup();
        let tree = VNode::element("div").with_text("same");
        renderer.render(Some(&tree), root).unwrap();
        renderer.host_mut().clear_ops();
        renderer.render(Some(&tree), root).unwrap();
        assert!(renderer.host().ops().is_empty());
    }

    #[test]
    fn test_unknown_container() {
        let (renderer, _root) = setup();
        let bogus = NodeHandle::new(9999);
        assert_eq!(
            renderer.render(Some(&VNode::element("p")), bogus),
            Err(RenderError::UnknownNode { node: bogus })
        );
    }

    #[test]
    fn test_fragment_owns_boundary_nodes() {
        let (renderer, root) = setup();
        let empty = VNode::fragment(Vec::new());
        renderer.render(Some(&empty), root).unwrap();

        let (start, end) = (empty.el().unwrap(), empty.anchor().unwrap());
        assert_ne!(start, end);
        assert_eq!(renderer.host().children(root), vec![start, end]);
        assert_eq!(renderer.host().inner_html(root), "");

        renderer.render(None, root).unwrap();
        assert!(renderer.host().children(root).is_empty());
    }

    #[test]
    fn test_component_without_render_holds_place() {
        let (renderer, root) = setup();
        let comp = VNode::component(Rc::new(crate::component::ComponentOptions::default()));
        assert_eq!(comp.instance_id(), None);

        renderer.render(Some(&comp), root).unwrap();
        let id = comp.instance_id().unwrap();
        assert!(renderer.instance(id).is_some());
        assert_eq!(renderer.host().children(root).len(), 1);

        renderer.render(None, root).unwrap();
        assert_eq!(renderer.instance_count(), 0);
        assert!(renderer.host().children(root).is_empty());
    }

    #[test]
    fn test_listener_replaced_on_update() {
        let (renderer, root) = setup();
        let hits = Rc::new(Cell::new(0));

        let h = hits.clone();
        let v1 = VNode::element("button")
            .with_prop("onClick", Callback::from_fn(move || h.set(h.get() + 1)));
        renderer.render(Some(&v1), root).unwrap();
        let button = v1.el().unwrap();
        assert!(renderer.dispatch(button, "click", &[]));
        assert_eq!(hits.get(), 1);

        let h = hits.clone();
        let v2 = VNode::element("button")
            .with_prop("onClick", Callback::from_fn(move || h.set(h.get() + 10)));
        renderer.render(Some(&v2), root).unwrap();
        assert!(renderer.dispatch(button, "click", &[]));
        assert_eq!(hits.get(), 11);

        let v3 = VNode::element("button").with_prop("onClick", Value::Null);
        renderer.render(Some(&v3), root).unwrap();
        assert!(!renderer.dispatch(button, "click", &[]));
    }
}
