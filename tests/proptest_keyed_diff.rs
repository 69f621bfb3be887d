//! Property tests for keyed child reconciliation.
//!
//! For any pair of key lists:
//! 1. The host children end up in the new order
//! 2. Every key present in both lists keeps its host node
//! 3. No stale nodes are left behind

mod common;

use std::collections::HashMap;

use proptest::prelude::*;
use spark_view::{HostOp, MemoryHost, NodeHandle, Renderer, Runtime, VNode};

fn keys() -> impl Strategy<Value = Vec<i64>> {
    proptest::sample::subsequence((0..12i64).collect::<Vec<_>>(), 0..=12).prop_shuffle()
}

fn list(keys: &[i64]) -> VNode {
    VNode::element("ul").with_children(
        keys.iter()
            .map(|k| VNode::element("li").with_key(*k).with_text(k.to_string()))
            .collect(),
    )
}

fn rendered(renderer: &Renderer<MemoryHost>, ul: NodeHandle) -> Vec<(String, NodeHandle)> {
    let host = renderer.host();
    host.children(ul)
        .iter()
        .map(|node| (host.text_content(*node), *node))
        .collect()
}

proptest! {
    #[test]
    fn keyed_patch_reorders_and_reuses(old in keys(), new in keys()) {
        common::init_tracing();
        let runtime = Runtime::new();
        let mut host = MemoryHost::new();
        let root = host.create_root("div");
        let renderer = Renderer::new(&runtime, host);

        renderer.render(Some(&list(&old)), root).unwrap();
        let ul = renderer.host().children(root)[0];
        let before: HashMap<String, NodeHandle> = rendered(&renderer, ul).into_iter().collect();
        renderer.host_mut().clear_ops();

        renderer.render(Some(&list(&new)), root).unwrap();
        let after = rendered(&renderer, ul);

        let texts: Vec<String> = after.iter().map(|(text, _)| text.clone()).collect();
        let expected: Vec<String> = new.iter().map(|k| k.to_string()).collect();
        prop_assert_eq!(texts, expected);

        for (text, node) in &after {
            if let Some(old_node) = before.get(text) {
                prop_assert_eq!(old_node, node);
            }
        }

        let removed = old.iter().filter(|k| !new.contains(k)).count();
        let removes = renderer
            .host()
            .ops()
            .iter()
            .filter(|op| matches!(op, HostOp::Remove { .. }))
            .count();
        prop_assert_eq!(removes, removed);
    }
}
