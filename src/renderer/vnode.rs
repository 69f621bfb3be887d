//! Virtual nodes - Immutable descriptions of the UI tree.
//!
//! A [`VNode`] is a cheap `Rc` handle. Render functions build fresh trees
//! each run; the renderer diffs them against the previous tree and records
//! the realized host node (or component instance) back on the node.
//!
//! # Building
//!
//! ```ignore
//! let list = VNode::element("ul").with_children(vec![
//!     VNode::element("li").with_key(1).with_text("one"),
//!     VNode::element("li").with_key(2).with_text("two"),
//! ]);
//! let button = VNode::element("button")
//!     .with_prop("class", "primary")
//!     .with_prop("onClick", Callback::from_fn(|| println!("clicked")));
//! ```

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use indexmap::IndexMap;

use super::host::NodeHandle;
use crate::component::{ComponentOptions, InstanceId};
use crate::reactivity::Value;

// =============================================================================
// Keys, Flags, Children
// =============================================================================

/// Identity of a node among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VKey {
    Int(i64),
    Str(Rc<str>),
}

impl From<i64> for VKey {
    fn from(value: i64) -> Self {
        VKey::Int(value)
    }
}

impl From<i32> for VKey {
    fn from(value: i32) -> Self {
        VKey::Int(value as i64)
    }
}

impl From<usize> for VKey {
    fn from(value: usize) -> Self {
        VKey::Int(value as i64)
    }
}

impl From<&str> for VKey {
    fn from(value: &str) -> Self {
        VKey::Str(Rc::from(value))
    }
}

impl From<String> for VKey {
    fn from(value: String) -> Self {
        VKey::Str(Rc::from(value))
    }
}

bitflags! {
    /// Kind and children shape of a node, precomputed for dispatch.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShapeFlags: u16 {
        const ELEMENT = 1 << 0;
        const TEXT = 1 << 1;
        const FRAGMENT = 1 << 2;
        const COMPONENT = 1 << 3;
        const TEXT_CHILDREN = 1 << 4;
        const ARRAY_CHILDREN = 1 << 5;
        const SLOTS_CHILDREN = 1 << 6;
    }
}

/// Named slot content passed to a component.
pub type SlotFn = Rc<dyn Fn() -> VNode>;

/// Slot name → content.
pub type Slots = IndexMap<Rc<str>, SlotFn>;

/// Props in declaration order.
pub type Props = IndexMap<Rc<str>, Value>;

#[derive(Clone, Default)]
pub enum Children {
    #[default]
    None,
    Text(Rc<str>),
    Nodes(Vec<VNode>),
    /// Only meaningful on component nodes.
    Slots(Slots),
}

impl Children {
    pub fn as_nodes(&self) -> Option<&[VNode]> {
        match self {
            Children::Nodes(nodes) => Some(nodes),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Children::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Debug for Children {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Children::None => f.write_str("None"),
            Children::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Children::Nodes(nodes) => f.debug_tuple("Nodes").field(nodes).finish(),
            Children::Slots(slots) => f
                .debug_tuple("Slots")
                .field(&slots.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}

/// What a node describes.
#[derive(Clone)]
pub enum VNodeKind {
    Element(Rc<str>),
    Text,
    Fragment,
    Component(Rc<ComponentOptions>),
}

impl VNodeKind {
    /// Same tag, same component definition (by identity), or both text or
    /// both fragment.
    pub fn same(&self, other: &VNodeKind) -> bool {
        match (self, other) {
            (VNodeKind::Element(a), VNodeKind::Element(b)) => a == b,
            (VNodeKind::Text, VNodeKind::Text) | (VNodeKind::Fragment, VNodeKind::Fragment) => true,
            (VNodeKind::Component(a), VNodeKind::Component(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for VNodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNodeKind::Element(tag) => write!(f, "<{tag}>"),
            VNodeKind::Text => f.write_str("#text"),
            VNodeKind::Fragment => f.write_str("#fragment"),
            VNodeKind::Component(options) => write!(f, "<{}/>", options.display_name()),
        }
    }
}

fn shape_of(kind: &VNodeKind, children: &Children) -> ShapeFlags {
    let mut shape = match kind {
        VNodeKind::Element(_) => ShapeFlags::ELEMENT,
        VNodeKind::Text => ShapeFlags::TEXT,
        VNodeKind::Fragment => ShapeFlags::FRAGMENT,
        VNodeKind::Component(_) => ShapeFlags::COMPONENT,
    };
    shape |= match children {
        Children::None => ShapeFlags::empty(),
        Children::Text(_) => ShapeFlags::TEXT_CHILDREN,
        Children::Nodes(_) => ShapeFlags::ARRAY_CHILDREN,
        Children::Slots(_) => ShapeFlags::SLOTS_CHILDREN,
    };
    shape
}

// =============================================================================
// VNode
// =============================================================================

struct VNodeInner {
    kind: VNodeKind,
    props: Props,
    children: Children,
    key: Option<VKey>,
    shape: ShapeFlags,
    /// Realized host node (elements and text), or the start anchor of a
    /// fragment.
    el: Cell<Option<NodeHandle>>,
    /// End anchor (fragments).
    anchor: Cell<Option<NodeHandle>>,
    /// Live instance (components).
    component: Cell<Option<InstanceId>>,
    mounted: Cell<bool>,
}

impl VNodeInner {
    fn new(kind: VNodeKind, children: Children) -> Self {
        Self {
            shape: shape_of(&kind, &children),
            kind,
            props: Props::new(),
            children,
            key: None,
            el: Cell::new(None),
            anchor: Cell::new(None),
            component: Cell::new(None),
            mounted: Cell::new(false),
        }
    }

    /// Copy of the description without any realized state.
    fn detached(&self) -> Self {
        let mut inner = Self::new(self.kind.clone(), self.children.clone());
        inner.props = self.props.clone();
        inner.key = self.key.clone();
        inner
    }
}

/// Handle to a virtual node. Cloning shares the node.
#[derive(Clone)]
pub struct VNode(Rc<VNodeInner>);

impl VNode {
    pub fn element(tag: &str) -> Self {
        Self::from_inner(VNodeInner::new(VNodeKind::Element(Rc::from(tag)), Children::None))
    }

    pub fn text(text: impl Into<Rc<str>>) -> Self {
        Self::from_inner(VNodeInner::new(VNodeKind::Text, Children::Text(text.into())))
    }

    pub fn fragment(children: Vec<VNode>) -> Self {
        Self::from_inner(VNodeInner::new(VNodeKind::Fragment, Children::Nodes(children)))
    }

    pub fn component(options: Rc<ComponentOptions>) -> Self {
        Self::from_inner(VNodeInner::new(VNodeKind::Component(options), Children::None))
    }

    fn from_inner(inner: VNodeInner) -> Self {
        VNode(Rc::new(inner))
    }

    /// Apply a builder edit. A node that is already shared is copied first,
    /// so other holders never observe the change.
    fn edit(self, f: impl FnOnce(&mut VNodeInner)) -> Self {
        let mut inner = match Rc::try_unwrap(self.0) {
            Ok(inner) => inner,
            Err(shared) => shared.detached(),
        };
        f(&mut inner);
        inner.shape = shape_of(&inner.kind, &inner.children);
        VNode(Rc::new(inner))
    }

    // -------------------------------------------------------------------------
    // Builders
    // -------------------------------------------------------------------------

    pub fn with_key(self, key: impl Into<VKey>) -> Self {
        let key = key.into();
        self.edit(|inner| inner.key = Some(key))
    }

    pub fn with_prop(self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.edit(|inner| {
            inner.props.insert(Rc::from(key), value);
        })
    }

    pub fn with_props(self, props: Props) -> Self {
        self.edit(|inner| inner.props = props)
    }

    pub fn with_text(self, text: impl Into<Rc<str>>) -> Self {
        let text = text.into();
        self.edit(|inner| inner.children = Children::Text(text))
    }

    pub fn with_children(self, children: Vec<VNode>) -> Self {
        self.edit(|inner| inner.children = Children::Nodes(children))
    }

    pub fn with_child(self, child: VNode) -> Self {
        self.edit(|inner| match &mut inner.children {
            Children::Nodes(nodes) => nodes.push(child),
            other => *other = Children::Nodes(vec![child]),
        })
    }

    /// Add slot content to a component node.
    pub fn with_slot(self, name: &str, render: impl Fn() -> VNode + 'static) -> Self {
        let render: SlotFn = Rc::new(render);
        self.edit(|inner| match &mut inner.children {
            Children::Slots(slots) => {
                slots.insert(Rc::from(name), render);
            }
            other => {
                let mut slots = Slots::new();
                slots.insert(Rc::from(name), render);
                *other = Children::Slots(slots);
            }
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn kind(&self) -> &VNodeKind {
        &self.0.kind
    }

    /// Element tag, if this is an element.
    pub fn tag(&self) -> Option<&str> {
        match &self.0.kind {
            VNodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn component_options(&self) -> Option<&Rc<ComponentOptions>> {
        match &self.0.kind {
            VNodeKind::Component(options) => Some(options),
            _ => None,
        }
    }

    pub fn props(&self) -> &Props {
        &self.0.props
    }

    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.0.props.get(key)
    }

    pub fn children(&self) -> &Children {
        &self.0.children
    }

    pub fn key(&self) -> Option<&VKey> {
        self.0.key.as_ref()
    }

    pub fn shape(&self) -> ShapeFlags {
        self.0.shape
    }

    /// Realized host node. For fragments, the empty text node that opens
    /// them; for components, the first host node of the rendered subtree.
    pub fn el(&self) -> Option<NodeHandle> {
        self.0.el.get()
    }

    /// The empty text node closing a fragment. Fragment children always
    /// sit before it.
    pub fn anchor(&self) -> Option<NodeHandle> {
        self.0.anchor.get()
    }

    /// Live component instance, for component nodes.
    pub fn instance_id(&self) -> Option<InstanceId> {
        self.0.component.get()
    }

    pub fn is_mounted(&self) -> bool {
        self.0.mounted.get()
    }

    /// Whether both handles are the same node.
    pub fn ptr_eq(&self, other: &VNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn same_kind(&self, other: &VNode) -> bool {
        self.0.kind.same(&other.0.kind)
    }

    pub(crate) fn set_el(&self, el: Option<NodeHandle>) {
        self.0.el.set(el);
    }

    pub(crate) fn set_anchor(&self, anchor: Option<NodeHandle>) {
        self.0.anchor.set(anchor);
    }

    pub(crate) fn set_component(&self, id: Option<InstanceId>) {
        self.0.component.set(id);
    }

    pub(crate) fn set_mounted(&self, mounted: bool) {
        self.0.mounted.set(mounted);
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("VNode");
        s.field("kind", &self.0.kind);
        if let Some(key) = &self.0.key {
            s.field("key", key);
        }
        if !self.0.props.is_empty() {
            s.field("props", &self.0.props);
        }
        s.field("children", &self.0.children).finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
