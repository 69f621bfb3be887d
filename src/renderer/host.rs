//! Host interface - The output tree the renderer drives.
//!
//! The renderer never touches a display directly. Everything it does to the
//! live tree goes through [`Host`], addressed by opaque [`NodeHandle`]s.

use crate::reactivity::Value;

/// Opaque handle of a node owned by a [`Host`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(u64);

impl NodeHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Capabilities the renderer needs from an output tree.
///
/// `anchor: None` in [`Host::insert`] means append. `next: None` in
/// [`Host::patch_prop`] means the prop was removed.
pub trait Host {
    fn create_element(&mut self, tag: &str) -> NodeHandle;

    fn create_text(&mut self, text: &str) -> NodeHandle;

    /// Replace the content of a text node.
    fn set_text(&mut self, node: NodeHandle, text: &str);

    /// Replace all children of an element with a single text run.
    fn set_element_text(&mut self, el: NodeHandle, text: &str);

    /// Insert (or move) `child` into `parent` before `anchor`.
    fn insert(&mut self, child: NodeHandle, parent: NodeHandle, anchor: Option<NodeHandle>);

    /// Detach `child` from its parent.
    fn remove(&mut self, child: NodeHandle);

    fn parent_node(&self, node: NodeHandle) -> Option<NodeHandle>;

    fn next_sibling(&self, node: NodeHandle) -> Option<NodeHandle>;

    fn patch_prop(&mut self, el: NodeHandle, key: &str, prev: Option<&Value>, next: Option<&Value>);

    /// Whether the handle refers to a live node.
    fn contains(&self, _node: NodeHandle) -> bool {
        true
    }
}
