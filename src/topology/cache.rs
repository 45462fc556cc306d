//! Cache invalidation utilities and the structural memo table.
//!
//! Derived structural facts are expensive to recompute on every query, so the
//! tree memoizes them here. The invalidation discipline is the heart of cache
//! coherence: every topology or relabeling mutation clears the whole table,
//! while time-only mutations clear just the distance memo (structural facts
//! cannot change under them).

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

/// Anything that caches derived topology should implement this.
pub trait InvalidateCache {
    /// Invalidate *all* internal caches so future queries recompute correctly.
    fn invalidate_cache(&mut self);
}

// Blanket impl for Box<T>
impl<T: InvalidateCache + ?Sized> InvalidateCache for Box<T> {
    #[inline]
    fn invalidate_cache(&mut self) {
        (**self).invalidate_cache();
    }
}

/// Lazily populated memo table over one tree instance.
///
/// Fixed-field layout: each derived fact has its own slot, and each mutating
/// operation names the clear it performs. Whole-structure facts live in
/// `OnceCell`s filled wholesale on first access; the ancestor and distance
/// memos accumulate per node behind locks so reads stay `&self`.
#[derive(Debug, Default)]
pub(crate) struct StructuralCache {
    pub root: OnceCell<String>,
    pub leaves: OnceCell<Vec<String>>,
    pub internal_nodes: OnceCell<Vec<String>>,
    pub nodes: OnceCell<Vec<String>>,
    pub edges: OnceCell<Vec<(String, String)>>,
    /// node -> leaves of the subtree rooted there, computed in one postorder.
    pub subtree_leaves: OnceCell<HashMap<String, Vec<String>>>,
    /// node -> ancestor chain, nearest first; filled per queried node.
    pub ancestors: RwLock<HashMap<String, Vec<String>>>,
    /// source -> (target -> path distance); filled per queried source.
    pub distances: RwLock<HashMap<String, HashMap<String, f64>>>,
}

impl StructuralCache {
    /// Drop everything: required after any node/edge mutation or relabeling.
    pub fn clear_topology(&mut self) {
        self.root.take();
        self.leaves.take();
        self.internal_nodes.take();
        self.nodes.take();
        self.edges.take();
        self.subtree_leaves.take();
        self.ancestors.get_mut().clear();
        self.distances.get_mut().clear();
    }

    /// Drop only the distance memo: required after any time-value change.
    pub fn clear_distances(&mut self) {
        self.distances.get_mut().clear();
    }
}

// A cloned tree starts with a cold cache; facts repopulate lazily.
impl Clone for StructuralCache {
    fn clone(&self) -> Self {
        StructuralCache::default()
    }
}
