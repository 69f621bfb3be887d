//! Children reconciliation.
//!
//! Sequences are diffed with the keyed strategy:
//!
//! 1. Patch the common prefix
//! 2. Patch the common suffix
//! 3. Only new nodes left → mount them
//! 4. Only old nodes left → unmount them
//! 5. Otherwise map new keys to positions, walk the old range patching
//!    matches into `source`, unmount the rest, and note whether any match
//!    went backwards
//! 6. Walk the new range from the end: mount unmatched slots, move slots
//!    outside the longest increasing subsequence of `source`
//!
//! Nodes inside the LIS keep their relative order, so the number of host
//! moves is minimal.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use super::host::{Host, NodeHandle};
use super::lis::longest_increasing_subsequence;
use super::patch::RendererInner;
use super::vnode::{Children, VKey, VNode};
use crate::error::Result;

impl<H: Host + 'static> RendererInner<H> {
    /// Bring `container`'s children from `n1`'s shape to `n2`'s.
    pub(crate) fn patch_children(
        self: &Rc<Self>,
        n1: &VNode,
        n2: &VNode,
        container: NodeHandle,
        anchor: Option<NodeHandle>,
    ) -> Result<()> {
        match n2.children() {
            Children::Text(text) => {
                match n1.children() {
                    Children::Nodes(old) => {
                        for child in old {
                            self.unmount(child);
                        }
                    }
                    Children::Text(prev) if prev == text => return Ok(()),
                    _ => {}
                }
                self.host.borrow_mut().set_element_text(container, text);
            }
            Children::Nodes(new) => match n1.children() {
                Children::Nodes(old) => {
                    self.check_keys(new)?;
                    self.patch_keyed_children(old, new, container, anchor)?;
                }
                other => {
                    if matches!(other, Children::Text(_)) {
                        self.host.borrow_mut().set_element_text(container, "");
                    }
                    self.mount_children(new, container, anchor)?;
                }
            },
            Children::None | Children::Slots(_) => match n1.children() {
                Children::Nodes(old) => {
                    for child in old {
                        self.unmount(child);
                    }
                }
                Children::Text(_) => self.host.borrow_mut().set_element_text(container, ""),
                _ => {}
            },
        }
        Ok(())
    }

    fn patch_keyed_children(
        self: &Rc<Self>,
        old: &[VNode],
        new: &[VNode],
        container: NodeHandle,
        parent_anchor: Option<NodeHandle>,
    ) -> Result<()> {
        // Exclusive ends.
        let mut start = 0;
        let mut old_end = old.len();
        let mut new_end = new.len();

        while start < old_end && start < new_end && old[start].key() == new[start].key() {
            self.patch(Some(&old[start]), &new[start], container, None)?;
            start += 1;
        }

        while start < old_end
            && start < new_end
            && old[old_end - 1].key() == new[new_end - 1].key()
        {
            self.patch(Some(&old[old_end - 1]), &new[new_end - 1], container, None)?;
            old_end -= 1;
            new_end -= 1;
        }

        if start >= old_end {
            if start < new_end {
                let anchor = self.anchor_at(new, new_end, parent_anchor);
                for node in &new[start..new_end] {
                    self.patch(None, node, container, anchor)?;
                }
            }
            return Ok(());
        }

        if start >= new_end {
            for node in &old[start..old_end] {
                self.unmount(node);
            }
            return Ok(());
        }

        // General case.
        let count = new_end - start;
        let mut source: Vec<Option<usize>> = vec![None; count];
        let key_index: HashMap<&VKey, usize> = (start..new_end)
            .filter_map(|i| new[i].key().map(|key| (key, i)))
            .collect();

        let mut moved = false;
        let mut last_index = 0;
        let mut patched = 0;
        for (i, old_node) in old.iter().enumerate().take(old_end).skip(start) {
            if patched >= count {
                self.unmount(old_node);
                continue;
            }
            let found = match old_node.key() {
                Some(key) => key_index.get(key).copied(),
                None => (start..new_end).find(|&n| {
                    new[n].key().is_none()
                        && source[n - start].is_none()
                        && new[n].same_kind(old_node)
                }),
            };
            match found {
                Some(k) => {
                    self.patch(Some(old_node), &new[k], container, None)?;
                    patched += 1;
                    source[k - start] = Some(i);
                    if k < last_index {
                        moved = true;
                    } else {
                        last_index = k;
                    }
                }
                None => self.unmount(old_node),
            }
        }

        let stable = if moved {
            longest_increasing_subsequence(&source)
        } else {
            Vec::new()
        };
        let mut stable_rest = stable.len();
        let mut moves = 0;

        for i in (0..count).rev() {
            let pos = start + i;
            let node = &new[pos];
            let anchor = self.anchor_at(new, pos + 1, parent_anchor);
            if source[i].is_none() {
                self.patch(None, node, container, anchor)?;
            } else if moved {
                if stable_rest > 0 && stable[stable_rest - 1] == i {
                    stable_rest -= 1;
                } else {
                    self.move_vnode(node, container, anchor);
                    moves += 1;
                }
            }
        }
        trace!(count, patched, moves, "keyed children reconciled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::RenderError;
    use crate::reactivity::Runtime;
    use crate::renderer::{HostOp, MemoryHost, NodeHandle, Renderer, RendererConfig, VNode};

    fn setup() -> (Renderer<MemoryHost>, NodeHandle) {
        let rt = Runtime::new();
        let mut host = MemoryHost::new();
        let root = host.create_root("div");
        (Renderer::new(&rt, host), root)
    }

    fn list(keys: &[i64]) -> VNode {
        VNode::element("ul").with_children(
            keys.iter()
                .map(|k| VNode::element("li").with_key(*k).with_text(k.to_string()))
                .collect(),
        )
    }

    fn html(keys: &[i64]) -> String {
        let items: String = keys.iter().map(|k| format!("<li>{k}</li>")).collect();
        format!("<ul>{items}</ul>")
    }

    fn count_ops(ops: &[HostOp], pred: impl Fn(&HostOp) -> bool) -> usize {
        ops.iter().filter(|op| pred(op)).count()
    }

    #[test]
    fn test_swap_is_single_move() {
        let (renderer, root) = setup();
        renderer.render(Some(&list(&[1, 2, 3, 4])), root).unwrap();
        renderer.host_mut().clear_ops();

        renderer.render(Some(&list(&[1, 3, 2, 4])), root).unwrap();
        let ops = renderer.host_mut().take_ops();
        assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::Insert { .. })), 1);
        assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::CreateElement { .. })), 0);
        assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::Remove { .. })), 0);
        assert_eq!(renderer.host().inner_html(root), html(&[1, 3, 2, 4]));
    }

    #[test]
    fn test_append_and_prepend() {
        let (renderer, root) = setup();
        renderer.render(Some(&list(&[2, 3])), root).unwrap();
        renderer.render(Some(&list(&[1, 2, 3, 4])), root).unwrap();
        assert_eq!(renderer.host().inner_html(root), html(&[1, 2, 3, 4]));
    }

    #[test]
    fn test_remove_from_middle() {
        let (renderer, root) = setup();
        renderer.render(Some(&list(&[1, 2, 3, 4])), root).unwrap();
        renderer.host_mut().clear_ops();
        renderer.render(Some(&list(&[1, 4])), root).unwrap();

        let ops = renderer.host_mut().take_ops();
        assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::Remove { .. })), 2);
        assert_eq!(renderer.host().inner_html(root), html(&[1, 4]));
    }

    #[test]
    fn test_insert_without_moves_mounts_new_nodes() {
        let (renderer, root) = setup();
        renderer.render(Some(&list(&[1, 2, 5])), root).unwrap();
        renderer.render(Some(&list(&[1, 3, 2, 4, 5])), root).unwrap();
        assert_eq!(renderer.host().inner_html(root), html(&[1, 3, 2, 4, 5]));
    }

    #[test]
    fn test_mixed_reorder() {
        let (renderer, root) = setup();
        renderer.render(Some(&list(&[1, 2, 3, 4, 6, 5])), root).unwrap();
        renderer.render(Some(&list(&[1, 3, 4, 2, 7, 5])), root).unwrap();
        assert_eq!(renderer.host().inner_html(root), html(&[1, 3, 4, 2, 7, 5]));
    }

    #[test]
    fn test_nodes_are_reused_across_reorder() {
        let (renderer, root) = setup();
        let before = list(&[1, 2, 3]);
        renderer.render(Some(&before), root).unwrap();
        let after = list(&[3, 1, 2]);
        renderer.render(Some(&after), root).unwrap();

        let els = |v: &VNode| -> Vec<_> {
            v.children().as_nodes().unwrap().iter().map(|n| n.el()).collect()
        };
        let (old_els, new_els) = (els(&before), els(&after));
        assert_eq!(new_els, vec![old_els[2], old_els[0], old_els[1]]);
    }

    #[test]
    fn test_text_to_nodes_and_back() {
        let (renderer, root) = setup();
        renderer.render(Some(&VNode::element("p").with_text("plain")), root).unwrap();
        renderer
            .render(Some(&VNode::element("p").with_children(vec![VNode::text("a")])), root)
            .unwrap();
        assert_eq!(renderer.host().inner_html(root), "<p>a</p>");
        renderer.render(Some(&VNode::element("p").with_text("b")), root).unwrap();
        assert_eq!(renderer.host().inner_html(root), "<p>b</p>");
        renderer.render(Some(&VNode::element("p")), root).unwrap();
        assert_eq!(renderer.host().inner_html(root), "<p></p>");
    }

    #[test]
    fn test_fragment_children_respect_following_sibling() {
        let (renderer, root) = setup();
        let tree = |keys: &[i64]| {
            VNode::element("div").with_children(vec![
                VNode::fragment(
                    keys.iter()
                        .map(|k| VNode::element("i").with_key(*k).with_text(k.to_string()))
                        .collect(),
                ),
                VNode::element("footer"),
            ])
        };
        renderer.render(Some(&tree(&[1])), root).unwrap();
        renderer.render(Some(&tree(&[1, 2])), root).unwrap();
        assert_eq!(
            renderer.host().inner_html(root),
            "<div><i>1</i><i>2</i><footer></footer></div>"
        );
    }

    #[test]
    fn test_empty_fragment_keeps_its_place() {
        let (renderer, root) = setup();
        let tree = |items: Vec<VNode>| {
            VNode::element("div")
                .with_children(vec![VNode::fragment(items), VNode::element("footer")])
        };
        renderer.render(Some(&tree(vec![])), root).unwrap();
        assert_eq!(renderer.host().inner_html(root), "<div><footer></footer></div>");

        renderer
            .render(Some(&tree(vec![VNode::element("i").with_text("a")])), root)
            .unwrap();
        assert_eq!(
            renderer.host().inner_html(root),
            "<div><i>a</i><footer></footer></div>"
        );
    }

    #[test]
    fn test_fragment_shrinks_and_grows_between_siblings() {
        let (renderer, root) = setup();
        let tree = |keys: &[i64]| {
            VNode::element("div").with_children(vec![
                VNode::element("header"),
                VNode::fragment(
                    keys.iter()
                        .map(|k| VNode::element("i").with_key(*k).with_text(k.to_string()))
                        .collect(),
                ),
                VNode::element("footer"),
            ])
        };
        let html = |inner: &str| format!("<div><header></header>{inner}<footer></footer></div>");

        renderer.render(Some(&tree(&[1, 2])), root).unwrap();
        renderer.render(Some(&tree(&[])), root).unwrap();
        assert_eq!(renderer.host().inner_html(root), html(""));

        renderer.render(Some(&tree(&[3, 1])), root).unwrap();
        assert_eq!(renderer.host().inner_html(root), html("<i>3</i><i>1</i>"));
    }

    #[test]
    fn test_keyed_fragments_move_whole() {
        let (renderer, root) = setup();
        let tree = |keys: &[i64]| {
            VNode::element("ul").with_children(
                keys.iter()
                    .map(|k| {
                        VNode::fragment(vec![
                            VNode::element("li").with_text(format!("{k}a")),
                            VNode::element("li").with_text(format!("{k}b")),
                        ])
                        .with_key(*k)
                    })
                    .collect(),
            )
        };
        renderer.render(Some(&tree(&[1, 2])), root).unwrap();
        renderer.render(Some(&tree(&[2, 1])), root).unwrap();
        assert_eq!(
            renderer.host().inner_html(root),
            "<ul><li>2a</li><li>2b</li><li>1a</li><li>1b</li></ul>"
        );
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let (renderer, root) = setup();
        assert!(matches!(
            renderer.render(Some(&list(&[1, 1])), root),
            Err(RenderError::DuplicateKey { .. })
        ));

        let rt = Runtime::new();
        let mut host = MemoryHost::new();
        let root = host.create_root("div");
        let lenient = Renderer::with_config(
            &rt,
            host,
            RendererConfig {
                check_duplicate_keys: false,
            },
        );
        assert!(lenient.render(Some(&list(&[1, 1])), root).is_ok());
    }
}
