//! Depth-first walks over the topology store.
//!
//! All walks use an explicit stack (tree depth is unbounded by anything but
//! the data) and preserve the stored child order, so traversal output is
//! deterministic for a given tree.

use crate::topology::graph::TreeGraph;

/// Nodes of the subtree rooted at `source`, parents before children.
pub(crate) fn preorder_nodes(graph: &TreeGraph, source: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack = vec![source.to_string()];
    while let Some(n) = stack.pop() {
        let children = graph.children_with_lengths(&n);
        for (child, _) in children.iter().rev() {
            stack.push(child.clone());
        }
        out.push(n);
    }
    out
}

/// Nodes of the subtree rooted at `source`, children before parents,
/// left-to-right.
pub(crate) fn postorder_nodes(graph: &TreeGraph, source: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack = vec![source.to_string()];
    while let Some(n) = stack.pop() {
        for (child, _) in graph.children_with_lengths(&n) {
            stack.push(child.clone());
        }
        out.push(n);
    }
    out.reverse();
    out
}

/// Edges of the subtree rooted at `source`; every edge appears after the
/// edge leading into its parent, so one pass can re-derive times.
pub(crate) fn preorder_edges(graph: &TreeGraph, source: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for node in preorder_nodes(graph, source) {
        for (child, _) in graph.children_with_lengths(&node) {
            out.push((node.clone(), child.clone()));
        }
    }
    out
}
