//! In-memory host - A headless output tree.
//!
//! [`MemoryHost`] keeps nodes in an arena keyed by [`NodeHandle`], records
//! every mutation the renderer issues as a [`HostOp`], and serializes
//! subtrees to HTML-like markup. It backs headless rendering and tests.
//!
//! # Props
//!
//! | key            | stored as                                       |
//! |----------------|-------------------------------------------------|
//! | `on<Event>`    | listener for `event` (lower-cased), replaceable |
//! | `class`        | normalized class string                         |
//! | anything else  | attribute (`null`/`undefined`/`false` remove)   |

use std::collections::HashMap;
use std::fmt::Write as _;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::trace;

use super::class::normalize_class;
use super::host::{Host, NodeHandle};
use super::patch::Renderer;
use crate::reactivity::{Callback, Value};

/// One mutation issued by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    CreateElement { node: NodeHandle, tag: Rc<str> },
    CreateText { node: NodeHandle, text: String },
    SetText { node: NodeHandle, text: String },
    SetElementText { node: NodeHandle, text: String },
    Insert { child: NodeHandle, parent: NodeHandle, anchor: Option<NodeHandle> },
    Remove { child: NodeHandle },
    PatchProp { node: NodeHandle, key: Rc<str> },
}

#[derive(Debug)]
enum NodeData {
    Element {
        tag: Rc<str>,
        class: Option<String>,
        attrs: IndexMap<Rc<str>, String>,
        listeners: IndexMap<Rc<str>, Callback>,
        children: Vec<NodeHandle>,
    },
    Text(String),
}

#[derive(Debug)]
struct MemNode {
    data: NodeData,
    parent: Option<NodeHandle>,
}

/// Arena-backed [`Host`] for headless rendering.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: HashMap<NodeHandle, MemNode>,
    next: u64,
    ops: Vec<HostOp>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached element to render into. Not recorded as an op.
    pub fn create_root(&mut self, tag: &str) -> NodeHandle {
        self.alloc(NodeData::Element {
            tag: Rc::from(tag),
            class: None,
            attrs: IndexMap::new(),
            listeners: IndexMap::new(),
            children: Vec::new(),
        })
    }

    fn alloc(&mut self, data: NodeData) -> NodeHandle {
        self.next += 1;
        let handle = NodeHandle::new(self.next);
        self.nodes.insert(handle, MemNode { data, parent: None });
        handle
    }

    // -------------------------------------------------------------------------
    // Op log
    // -------------------------------------------------------------------------

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn tag(&self, node: NodeHandle) -> Option<&str> {
        match &self.nodes.get(&node)?.data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Text(_) => None,
        }
    }

    pub fn children(&self, node: NodeHandle) -> &[NodeHandle] {
        match self.nodes.get(&node).map(|n| &n.data) {
            Some(NodeData::Element { children, .. }) => children.as_slice(),
            _ => &[],
        }
    }

    pub fn attribute(&self, node: NodeHandle, name: &str) -> Option<&str> {
        match &self.nodes.get(&node)?.data {
            NodeData::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            NodeData::Text(_) => None,
        }
    }

    pub fn class(&self, node: NodeHandle) -> Option<&str> {
        match &self.nodes.get(&node)?.data {
            NodeData::Element { class, .. } => class.as_deref(),
            NodeData::Text(_) => None,
        }
    }

    /// Current handler for `event` (e.g. `"click"`).
    pub fn listener(&self, node: NodeHandle, event: &str) -> Option<Callback> {
        match &self.nodes.get(&node)?.data {
            NodeData::Element { listeners, .. } => listeners.get(event).cloned(),
            NodeData::Text(_) => None,
        }
    }

    /// Concatenated text of the subtree.
    pub fn text_content(&self, node: NodeHandle) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeHandle, out: &mut String) {
        match self.nodes.get(&node).map(|n| &n.data) {
            Some(NodeData::Text(text)) => out.push_str(text),
            Some(NodeData::Element { children, .. }) => {
                for child in children {
                    self.collect_text(*child, out);
                }
            }
            None => {}
        }
    }

    /// Markup of the node's children.
    pub fn inner_html(&self, node: NodeHandle) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_html(*child, &mut out);
        }
        out
    }

    /// Markup of the node itself.
    pub fn outer_html(&self, node: NodeHandle) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, node: NodeHandle, out: &mut String) {
        let Some(mem) = self.nodes.get(&node) else {
            return;
        };
        match &mem.data {
            NodeData::Text(text) => escape_into(text, out),
            NodeData::Element {
                tag,
                class,
                attrs,
                children,
                ..
            } => {
                let _ = write!(out, "<{tag}");
                if let Some(class) = class {
                    out.push_str(" class=\"");
                    escape_into(class, out);
                    out.push('"');
                }
                for (name, value) in attrs {
                    if value.is_empty() {
                        let _ = write!(out, " {name}");
                    } else {
                        let _ = write!(out, " {name}=\"");
                        escape_into(value, out);
                        out.push('"');
                    }
                }
                out.push('>');
                for child in children {
                    self.write_html(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    // -------------------------------------------------------------------------
    // Tree plumbing
    // -------------------------------------------------------------------------

    fn detach(&mut self, child: NodeHandle) {
        let Some(parent) = self.nodes.get_mut(&child).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(NodeData::Element { children, .. }) =
            self.nodes.get_mut(&parent).map(|n| &mut n.data)
        {
            children.retain(|c| *c != child);
        }
    }

    fn drop_subtree(&mut self, node: NodeHandle) {
        let Some(mem) = self.nodes.remove(&node) else {
            return;
        };
        if let NodeData::Element { children, .. } = mem.data {
            for child in children {
                self.drop_subtree(child);
            }
        }
    }
}

fn escape_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
}

impl Host for MemoryHost {
    fn create_element(&mut self, tag: &str) -> NodeHandle {
        let node = self.create_root(tag);
        self.ops.push(HostOp::CreateElement {
            node,
            tag: Rc::from(tag),
        });
        node
    }

    fn create_text(&mut self, text: &str) -> NodeHandle {
        let node = self.alloc(NodeData::Text(text.to_string()));
        self.ops.push(HostOp::CreateText {
            node,
            text: text.to_string(),
        });
        node
    }

    fn set_text(&mut self, node: NodeHandle, text: &str) {
        if let Some(NodeData::Text(content)) = self.nodes.get_mut(&node).map(|n| &mut n.data) {
            *content = text.to_string();
        }
        self.ops.push(HostOp::SetText {
            node,
            text: text.to_string(),
        });
    }

    fn set_element_text(&mut self, el: NodeHandle, text: &str) {
        let old = match self.nodes.get_mut(&el).map(|n| &mut n.data) {
            Some(NodeData::Element { children, .. }) => std::mem::take(children),
            _ => Vec::new(),
        };
        for child in old {
            self.drop_subtree(child);
        }
        if !text.is_empty() {
            let run = self.alloc(NodeData::Text(text.to_string()));
            if let Some(mem) = self.nodes.get_mut(&run) {
                mem.parent = Some(el);
            }
            if let Some(NodeData::Element { children, .. }) =
                self.nodes.get_mut(&el).map(|n| &mut n.data)
            {
                children.push(run);
            }
        }
        self.ops.push(HostOp::SetElementText {
            node: el,
            text: text.to_string(),
        });
    }

    fn insert(&mut self, child: NodeHandle, parent: NodeHandle, anchor: Option<NodeHandle>) {
        self.detach(child);
        if let Some(NodeData::Element { children, .. }) =
            self.nodes.get_mut(&parent).map(|n| &mut n.data)
        {
            let at = anchor
                .and_then(|a| children.iter().position(|c| *c == a))
                .unwrap_or(children.len());
            children.insert(at, child);
        }
        if let Some(mem) = self.nodes.get_mut(&child) {
            mem.parent = Some(parent);
        }
        self.ops.push(HostOp::Insert {
            child,
            parent,
            anchor,
        });
    }

    fn remove(&mut self, child: NodeHandle) {
        self.detach(child);
        self.drop_subtree(child);
        self.ops.push(HostOp::Remove { child });
    }

    fn parent_node(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.nodes.get(&node)?.parent
    }

    fn next_sibling(&self, node: NodeHandle) -> Option<NodeHandle> {
        let parent = self.parent_node(node)?;
        let siblings = self.children(parent);
        let at = siblings.iter().position(|c| *c == node)?;
        siblings.get(at + 1).copied()
    }

    fn patch_prop(
        &mut self,
        el: NodeHandle,
        key: &str,
        _prev: Option<&Value>,
        next: Option<&Value>,
    ) {
        self.ops.push(HostOp::PatchProp {
            node: el,
            key: Rc::from(key),
        });
        let Some(NodeData::Element {
            class,
            attrs,
            listeners,
            ..
        }) = self.nodes.get_mut(&el).map(|n| &mut n.data)
        else {
            return;
        };

        if let Some(event) = key.strip_prefix("on").filter(|e| !e.is_empty()) {
            let event: Rc<str> = Rc::from(event.to_lowercase());
            match next.and_then(Value::as_callback) {
                // Replacing the handler keeps the listener slot in place.
                Some(handler) => {
                    listeners.insert(event, handler.clone());
                }
                None => {
                    listeners.shift_remove(&event);
                }
            }
            return;
        }

        if key == "class" {
            let normalized = next.map(normalize_class).unwrap_or_default();
            *class = (!normalized.is_empty()).then_some(normalized);
            return;
        }

        match next {
            None | Some(Value::Null | Value::Undefined | Value::Bool(false)) => {
                attrs.shift_remove(key);
            }
            Some(Value::Bool(true)) => {
                attrs.insert(Rc::from(key), String::new());
            }
            Some(value) => {
                attrs.insert(Rc::from(key), value.to_string());
            }
        }
    }

    fn contains(&self, node: NodeHandle) -> bool {
        self.nodes.contains_key(&node)
    }
}

impl Renderer<MemoryHost> {
    /// Invoke the listener for `event` on `node`, as if the event fired.
    ///
    /// Returns false if no listener is attached.
    pub fn dispatch(&self, node: NodeHandle, event: &str, args: &[Value]) -> bool {
        let handler = self.host().listener(node, event);
        match handler {
            Some(handler) => {
                trace!(?node, event, "dispatch");
                handler.call(args);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_before_anchor_and_move() {
        let mut host = MemoryHost::new();
        let root = host.create_root("div");
        let a = host.create_text("a");
        let b = host.create_text("b");
        host.insert(a, root, None);
        host.insert(b, root, Some(a));
        assert_eq!(host.inner_html(root), "ba");

        host.insert(b, root, None);
        assert_eq!(host.inner_html(root), "ab");
        assert_eq!(host.next_sibling(a), Some(b));
        assert_eq!(host.next_sibling(b), None);
    }

    #[test]
    fn test_remove_drops_subtree() {
        let mut host = MemoryHost::new();
        let root = host.create_root("div");
        let p = host.create_element("p");
        let t = host.create_text("x");
        host.insert(t, p, None);
        host.insert(p, root, None);

        host.remove(p);
        assert!(!host.contains(p));
        assert!(!host.contains(t));
        assert_eq!(host.inner_html(root), "");
    }

    #[test]
    fn test_props_split_into_class_attrs_and_listeners() {
        let mut host = MemoryHost::new();
        let el = host.create_element("input");
        let flags = crate::reactivity::RawObject::map().with("on", true).with("off", false);
        host.patch_prop(el, "class", None, Some(&Value::from(flags)));
        host.patch_prop(el, "disabled", None, Some(&Value::from(true)));
        host.patch_prop(el, "id", None, Some(&Value::from("name")));
        host.patch_prop(el, "onClick", None, Some(&Value::from(Callback::from_fn(|| {}))));

        assert_eq!(host.outer_html(el), "<input class=\"on\" disabled id=\"name\"></input>");
        assert!(host.listener(el, "click").is_some());

        host.patch_prop(el, "disabled", None, Some(&Value::from(false)));
        host.patch_prop(el, "onClick", None, None);
        assert_eq!(host.attribute(el, "disabled"), None);
        assert!(host.listener(el, "click").is_none());
    }

    #[test]
    fn test_element_text_replaces_children() {
        let mut host = MemoryHost::new();
        let root = host.create_root("div");
        let p = host.create_element("p");
        host.insert(p, root, None);

        host.set_element_text(root, "<hi>");
        assert_eq!(host.inner_html(root), "&lt;hi&gt;");
        assert!(!host.contains(p));

        host.set_element_text(root, "");
        assert!(host.children(root).is_empty());
    }
}
