//! Topology surgery: leaf insertion and removal, unifurcation collapsing,
//! and mutationless-edge collapsing.
//!
//! Every operation here invalidates the whole structural cache before
//! returning. Operations that change the leaf set additionally resynchronize
//! the leaf-indexed tables (character matrix, cell metadata, dissimilarity
//! map); the collapse operations never remove leaves and skip that step.

use std::collections::HashSet;

use crate::data::state::CharacterState;
use crate::tree::LineageTree;
use crate::tree_error::LineageTreeError;

impl LineageTree {
    /// Attach a new leaf under `parent` with branch length 0, so the leaf is
    /// initially co-located in time with its parent; callers adjust via
    /// `set_time` / `set_branch_length` afterwards.
    ///
    /// The leaf's data rows default to all-missing character states, null
    /// metadata, and infinite dissimilarity against every other leaf; a
    /// caller keeping a dissimilarity map is expected to recompute it.
    ///
    /// # Errors
    /// `DuplicateNode` if `node` exists, `NodeNotFound` if `parent` does not,
    /// and `LeafParent` if `parent` is itself a leaf (bookkeeping for the
    /// leaf-indexed tables would be ill-defined).
    pub fn add_leaf(
        &mut self,
        parent: &str,
        node: impl ToString,
    ) -> Result<(), LineageTreeError> {
        let node = node.to_string();
        let graph = self.graph()?;
        if graph.contains(&node) {
            return Err(LineageTreeError::DuplicateNode(node));
        }
        if !graph.contains(parent) {
            return Err(LineageTreeError::NodeNotFound(parent.to_string()));
        }
        if graph.out_degree(parent) == 0 {
            return Err(LineageTreeError::LeafParent(parent.to_string()));
        }

        let graph = self.graph_mut()?;
        graph.add_edge(parent, &node, 0.0);
        graph.rederive_times_from(parent);
        self.cache.clear_topology();
        self.register_data_with_tree()
    }

    /// Remove a leaf, then walk upward removing every ancestor left childless
    /// until reaching an ancestor that still has a child or the root.
    ///
    /// # Errors
    /// `NotALeaf` if `node` has children.
    pub fn remove_leaf_and_prune_lineage(
        &mut self,
        node: &str,
    ) -> Result<(), LineageTreeError> {
        self.require_node(node)?;
        if !self.is_leaf(node)? {
            return Err(LineageTreeError::NotALeaf(node.to_string()));
        }

        let graph = self.graph_mut()?;
        if graph.n_nodes() == 1 {
            graph.remove_node(node);
        } else {
            let mut current = graph.parent_of(node).map(str::to_string);
            graph.remove_node(node);
            while let Some(parent) = current {
                if graph.out_degree(&parent) == 0 && graph.parent_of(&parent).is_some() {
                    let next = graph.parent_of(&parent).map(str::to_string);
                    graph.remove_node(&parent);
                    current = next;
                } else {
                    break;
                }
            }
        }
        self.cache.clear_topology();
        self.register_data_with_tree()
    }

    /// Remove every single-child internal node below (and including) `source`
    /// (default: the root), reconnecting its parent directly to its child
    /// with the two branch lengths summed, so surviving node times are
    /// unchanged. The traversal source itself is the special first case: its
    /// single child is removed and the source reconnected to the grandchildren.
    pub fn collapse_unifurcations(
        &mut self,
        source: Option<&str>,
    ) -> Result<(), LineageTreeError> {
        let source = match source {
            Some(s) => {
                self.require_node(s)?;
                s.to_string()
            }
            None => self.root()?,
        };
        let postorder = self.depth_first_traverse_nodes(Some(&source), true)?;

        let graph = self.graph_mut()?;
        for node in postorder {
            // Leaves (and nodes already removed) have no children to collapse.
            if graph.out_degree(&node) == 0 {
                continue;
            }
            let children = graph.children_of(&node);
            if children.len() != 1 {
                continue;
            }
            let child = children[0].clone();
            if node == source {
                let t = graph.edge_length(&node, &child).unwrap_or(0.0);
                for (grandchild, t_below) in graph.children_with_lengths(&child).to_vec() {
                    graph.add_edge(&node, &grandchild, t + t_below);
                }
                graph.remove_node(&child);
            } else if let Some(parent) = graph.parent_of(&node).map(str::to_string) {
                let t = graph.edge_length(&parent, &node).unwrap_or(0.0);
                let t_below = graph.edge_length(&node, &child).unwrap_or(0.0);
                graph.add_edge(&parent, &child, t + t_below);
                graph.remove_node(&node);
            }
        }
        self.cache.clear_topology();
        Ok(())
    }

    /// Collapse edges with no mutations: a non-leaf child whose state vector
    /// equals its parent's is removed, its children reattached with summed
    /// branch lengths (times of survivors unchanged). Leaf children are never
    /// collapsed away, since their identity and states must remain observable.
    ///
    /// With `infer_ancestral_characters`, ancestral states are reconstructed
    /// first (see
    /// [`reconstruct_ancestral_characters`](LineageTree::reconstruct_ancestral_characters)).
    pub fn collapse_mutationless_edges(
        &mut self,
        infer_ancestral_characters: bool,
    ) -> Result<(), LineageTreeError> {
        if infer_ancestral_characters {
            self.reconstruct_ancestral_characters()?;
        }

        let postorder = self.depth_first_traverse_nodes(None, true)?;
        let graph = self.graph_mut()?;
        for node in postorder {
            if graph.out_degree(&node) == 0 {
                continue;
            }
            for (child, t) in graph.children_with_lengths(&node).to_vec() {
                if graph.out_degree(&child) == 0 {
                    continue;
                }
                if graph.states(&node) == graph.states(&child) {
                    for (grandchild, t_below) in
                        graph.children_with_lengths(&child).to_vec()
                    {
                        graph.add_edge(&node, &grandchild, t + t_below);
                    }
                    graph.remove_node(&child);
                }
            }
        }
        self.cache.clear_topology();
        Ok(())
    }

    /// Make the leaf-indexed tables consistent with the live leaf set: rows
    /// of departed leaves are dropped; new leaves get an all-missing
    /// character row, a null metadata row, and infinite dissimilarity to all
    /// other leaves.
    pub(crate) fn register_data_with_tree(&mut self) -> Result<(), LineageTreeError> {
        let leaves = match self.leaves() {
            Ok(leaves) => leaves,
            // A fully pruned tree has no leaves left to index.
            Err(_) => Vec::new(),
        };
        let leaf_set: HashSet<&str> = leaves.iter().map(String::as_str).collect();

        let mut seeded_rows: Vec<(String, Vec<CharacterState>)> = Vec::new();
        if let Some(matrix) = &mut self.current_matrix {
            for sample in matrix.sample_names() {
                if !leaf_set.contains(sample.as_str()) {
                    matrix.drop_row(&sample);
                }
            }
            let width = matrix.n_characters();
            for leaf in &leaves {
                if !matrix.contains(leaf) {
                    let states = vec![CharacterState::Missing; width];
                    matrix.set_row(leaf.clone(), states.clone())?;
                    seeded_rows.push((leaf.clone(), states));
                }
            }
        }
        if let Some(graph) = &mut self.graph {
            for (leaf, states) in seeded_rows {
                graph.set_states_raw(&leaf, states);
            }
        }

        if let Some(meta) = &mut self.cell_meta {
            for row in meta.row_names() {
                if !leaf_set.contains(row.as_str()) {
                    meta.drop_row(&row);
                }
            }
            for leaf in &leaves {
                meta.add_null_row(leaf.clone());
            }
        }

        if let Some(map) = &mut self.dissimilarity_map {
            for sample in map.samples() {
                if !leaf_set.contains(sample.as_str()) {
                    map.drop_sample(&sample);
                }
            }
            for leaf in &leaves {
                map.add_sample(leaf.clone());
            }
        }
        Ok(())
    }
}
