//! The lineage tree engine.
//!
//! [`LineageTree`] owns the topology store, the character data, and the
//! structural cache, and exposes the full query/mutation surface used by
//! solvers, branch-length estimators, and statistics modules. Every mutating
//! entry point restores two guarantees before returning:
//!
//! - `time(child) = time(parent) + length(parent, child)` on every edge;
//! - the structural cache holds no stale fact (topology mutations clear it
//!   wholesale, time-only mutations clear the distance memo).
//!
//! The tree is a unit of exclusive mutable state: it provides no internal
//! synchronization beyond the lock-guarded memo tables.

mod queries;
mod surgery;

use std::collections::HashMap;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::data::annotations::AnnotationTable;
use crate::data::dissimilarity::{DissimilarityMap, Priors};
use crate::data::matrix::CharacterMatrix;
use crate::data::state::CharacterState;
use crate::topology::cache::{InvalidateCache, StructuralCache};
use crate::topology::graph::{AttributeValue, RawTopology, TreeGraph};
use crate::topology::traversal::{postorder_nodes, preorder_edges, preorder_nodes};
use crate::tree_error::LineageTreeError;

/// Default sentinel for unobserved character positions.
pub const DEFAULT_MISSING_STATE: i64 = -1;

/// Per-character "lowest common ancestor" of several state vectors under
/// irreversible (Camin-Sokal) parsimony: a position is inherited only when
/// every vector agrees on the same non-missing value; disagreement or any
/// missing observation resolves to missing, never to a vote.
pub fn lca_characters(vectors: &[&[CharacterState]]) -> Vec<CharacterState> {
    let n = vectors.first().map_or(0, |v| v.len());
    (0..n)
        .map(|i| {
            let first = &vectors[0][i];
            if !first.is_missing() && vectors.iter().all(|v| v.get(i) == Some(first)) {
                first.clone()
            } else {
                CharacterState::Missing
            }
        })
        .collect()
}

/// The core tree object: topology, times, character states, and leaf data.
#[derive(Clone, Debug)]
pub struct LineageTree {
    missing_state_indicator: i64,
    graph: Option<TreeGraph>,
    pub(crate) cache: StructuralCache,
    original_matrix: Option<CharacterMatrix>,
    pub(crate) current_matrix: Option<CharacterMatrix>,
    pub(crate) dissimilarity_map: Option<DissimilarityMap>,
    /// Optional per-cell metadata, row-synchronized with the leaf set.
    pub cell_meta: Option<AnnotationTable>,
    /// Optional per-character metadata.
    pub character_meta: Option<AnnotationTable>,
    pub(crate) priors: Option<Priors>,
}

impl Default for LineageTree {
    fn default() -> Self {
        Self::new(DEFAULT_MISSING_STATE)
    }
}

impl InvalidateCache for LineageTree {
    fn invalidate_cache(&mut self) {
        self.cache.clear_topology();
    }
}

impl LineageTree {
    /// An empty tree with the given missing-state sentinel.
    pub fn new(missing_state_indicator: i64) -> Self {
        Self {
            missing_state_indicator,
            graph: None,
            cache: StructuralCache::default(),
            original_matrix: None,
            current_matrix: None,
            dissimilarity_map: None,
            cell_meta: None,
            character_meta: None,
            priors: None,
        }
    }

    /// The sentinel encoding unobserved character positions.
    #[inline]
    pub fn missing_state_indicator(&self) -> i64 {
        self.missing_state_indicator
    }

    pub(crate) fn graph(&self) -> Result<&TreeGraph, LineageTreeError> {
        self.graph.as_ref().ok_or(LineageTreeError::UninitializedTree)
    }

    pub(crate) fn graph_mut(&mut self) -> Result<&mut TreeGraph, LineageTreeError> {
        self.graph.as_mut().ok_or(LineageTreeError::UninitializedTree)
    }

    pub(crate) fn require_node(&self, node: &str) -> Result<(), LineageTreeError> {
        if self.graph()?.contains(node) {
            Ok(())
        } else {
            Err(LineageTreeError::NodeNotFound(node.to_string()))
        }
    }

    //=== ingestion ===

    /// Install a topology from a parsed node/edge structure.
    ///
    /// Identifiers are canonical strings already (the `RawTopology` builders
    /// force them). The topology is validated as a single rooted tree; edges
    /// without a recorded length default to 1. `time(root)` is 0 and all
    /// other times derive from the branch lengths. Leaves named by the
    /// original character matrix (if one was set) get their state rows;
    /// everything else starts with an empty state vector.
    pub fn populate_tree(&mut self, raw: &RawTopology) -> Result<(), LineageTreeError> {
        let mut graph = TreeGraph::from_raw(raw)?;
        if let Some(matrix) = &self.original_matrix {
            for node in graph.node_order().to_vec() {
                if let Some(states) = matrix.row(&node) {
                    graph.set_states_raw(&node, states.to_vec());
                }
            }
        }
        self.graph = Some(graph);
        self.cache.clear_topology();
        Ok(())
    }

    /// Set the character matrix, replacing both snapshots.
    ///
    /// If a topology is already present, the matrix must cover exactly the
    /// current leaf set and leaf state vectors are (re)initialized from it.
    pub fn set_character_matrix(
        &mut self,
        matrix: CharacterMatrix,
    ) -> Result<(), LineageTreeError> {
        if self.graph.is_some() {
            self.initialize_character_states_at_leaves(matrix)
        } else {
            self.original_matrix = Some(matrix.clone());
            self.current_matrix = Some(matrix);
            Ok(())
        }
    }

    /// Assign character states to every leaf from a leaf-indexed matrix whose
    /// row set must equal the leaf set; resets both matrix snapshots.
    pub fn initialize_character_states_at_leaves(
        &mut self,
        matrix: CharacterMatrix,
    ) -> Result<(), LineageTreeError> {
        let mut leaves = self.leaves()?;
        let mut samples = matrix.sample_names();
        leaves.sort();
        samples.sort();
        if leaves != samples {
            return Err(LineageTreeError::SampleSetMismatch(
                "character matrix row set does not match the leaf set".into(),
            ));
        }
        for leaf in &leaves {
            let states = matrix.row(leaf).unwrap_or(&[]).to_vec();
            self.graph_mut()?.set_states_raw(leaf, states);
        }
        self.original_matrix = Some(matrix.clone());
        self.current_matrix = Some(matrix);
        Ok(())
    }

    /// Assign character states to every node from a full mapping; leaf rows
    /// become both matrix snapshots.
    pub fn initialize_all_character_states(
        &mut self,
        mapping: &HashMap<String, Vec<CharacterState>>,
    ) -> Result<(), LineageTreeError> {
        let mut nodes = self.nodes()?;
        let mut keys: Vec<String> = mapping.keys().cloned().collect();
        nodes.sort();
        keys.sort();
        if nodes != keys {
            return Err(LineageTreeError::SampleSetMismatch(
                "state mapping does not account for all nodes".into(),
            ));
        }
        let mut leaf_rows = Vec::new();
        for leaf in self.leaves()? {
            leaf_rows.push((leaf.clone(), mapping[&leaf].clone()));
        }
        let matrix = CharacterMatrix::from_rows(leaf_rows)?;
        for (node, states) in mapping {
            self.graph_mut()?.set_states_raw(node, states.clone());
        }
        self.original_matrix = Some(matrix.clone());
        self.current_matrix = Some(matrix);
        Ok(())
    }

    /// Supply per-character, per-state prior probabilities.
    pub fn set_priors(&mut self, priors: Priors) {
        self.priors = Some(priors);
    }

    pub fn priors(&self) -> Option<&Priors> {
        self.priors.as_ref()
    }

    //=== structural queries (cached) ===

    /// The unique in-degree-0 node.
    pub fn root(&self) -> Result<String, LineageTreeError> {
        let graph = self.graph()?;
        self.cache
            .root
            .get_or_try_init(|| {
                graph.root().map(str::to_string).ok_or_else(|| {
                    LineageTreeError::InvalidTopology("tree has no nodes".into())
                })
            })
            .cloned()
    }

    /// All leaves (out-degree 0), in deterministic order.
    pub fn leaves(&self) -> Result<Vec<String>, LineageTreeError> {
        let graph = self.graph()?;
        Ok(self
            .cache
            .leaves
            .get_or_init(|| {
                graph
                    .node_order()
                    .iter()
                    .filter(|n| graph.out_degree(n) == 0)
                    .cloned()
                    .collect()
            })
            .clone())
    }

    /// All internal nodes (out-degree > 0, root included).
    pub fn internal_nodes(&self) -> Result<Vec<String>, LineageTreeError> {
        let graph = self.graph()?;
        Ok(self
            .cache
            .internal_nodes
            .get_or_init(|| {
                graph
                    .node_order()
                    .iter()
                    .filter(|n| graph.out_degree(n) > 0)
                    .cloned()
                    .collect()
            })
            .clone())
    }

    /// All nodes, in deterministic order.
    pub fn nodes(&self) -> Result<Vec<String>, LineageTreeError> {
        let graph = self.graph()?;
        Ok(self
            .cache
            .nodes
            .get_or_init(|| graph.node_order().to_vec())
            .clone())
    }

    /// All `(parent, child)` edges.
    pub fn edges(&self) -> Result<Vec<(String, String)>, LineageTreeError> {
        let graph = self.graph()?;
        Ok(self
            .cache
            .edges
            .get_or_init(|| {
                let mut edges = Vec::new();
                for node in graph.node_order() {
                    for (child, _) in graph.children_with_lengths(node) {
                        edges.push((node.clone(), child.clone()));
                    }
                }
                edges
            })
            .clone())
    }

    pub fn is_leaf(&self, node: &str) -> Result<bool, LineageTreeError> {
        self.require_node(node)?;
        Ok(self.graph()?.out_degree(node) == 0)
    }

    pub fn is_root(&self, node: &str) -> Result<bool, LineageTreeError> {
        self.require_node(node)?;
        Ok(self.graph()?.parent_of(node).is_none())
    }

    /// True for any node with children; the root counts as internal.
    pub fn is_internal(&self, node: &str) -> Result<bool, LineageTreeError> {
        self.require_node(node)?;
        Ok(self.graph()?.out_degree(node) > 0)
    }

    /// The parent of `node`, or `None` for the root.
    pub fn parent(&self, node: &str) -> Result<Option<String>, LineageTreeError> {
        self.require_node(node)?;
        Ok(self.graph()?.parent_of(node).map(str::to_string))
    }

    /// Direct children of `node`, in stored order.
    pub fn children(&self, node: &str) -> Result<Vec<String>, LineageTreeError> {
        self.require_node(node)?;
        Ok(self.graph()?.children_of(node))
    }

    /// Ancestors of `node`, nearest first, ending at the root.
    pub fn get_all_ancestors(&self, node: &str) -> Result<Vec<String>, LineageTreeError> {
        self.require_node(node)?;
        let cached = self.cache.ancestors.read().get(node).cloned();
        if let Some(chain) = cached {
            return Ok(chain);
        }
        let graph = self.graph()?;
        let mut chain = Vec::new();
        let mut current = node;
        while let Some(parent) = graph.parent_of(current) {
            chain.push(parent.to_string());
            current = parent;
        }
        self.cache
            .ancestors
            .write()
            .insert(node.to_string(), chain.clone());
        Ok(chain)
    }

    /// Leaves of the subtree rooted at `node`.
    pub fn leaves_in_subtree(&self, node: &str) -> Result<Vec<String>, LineageTreeError> {
        self.require_node(node)?;
        let graph = self.graph()?;
        let map = self.cache.subtree_leaves.get_or_init(|| {
            let mut map: HashMap<String, Vec<String>> = HashMap::new();
            if let Some(root) = graph.root() {
                for n in postorder_nodes(graph, root) {
                    if graph.out_degree(&n) == 0 {
                        map.insert(n.clone(), vec![n.clone()]);
                    } else {
                        let mut acc = Vec::new();
                        for child in graph.children_of(&n) {
                            if let Some(leaves) = map.get(&child) {
                                acc.extend(leaves.iter().cloned());
                            }
                        }
                        map.insert(n, acc);
                    }
                }
            }
            map
        });
        Ok(map.get(node).cloned().unwrap_or_default())
    }

    /// Depth-first node order from `source` (default: the root).
    pub fn depth_first_traverse_nodes(
        &self,
        source: Option<&str>,
        postorder: bool,
    ) -> Result<Vec<String>, LineageTreeError> {
        let source = match source {
            Some(s) => {
                self.require_node(s)?;
                s.to_string()
            }
            None => self.root()?,
        };
        let graph = self.graph()?;
        Ok(if postorder {
            postorder_nodes(graph, &source)
        } else {
            preorder_nodes(graph, &source)
        })
    }

    /// Depth-first edge order from `source` (default: the root).
    pub fn depth_first_traverse_edges(
        &self,
        source: Option<&str>,
    ) -> Result<Vec<(String, String)>, LineageTreeError> {
        let source = match source {
            Some(s) => {
                self.require_node(s)?;
                s.to_string()
            }
            None => self.root()?,
        };
        Ok(preorder_edges(self.graph()?, &source))
    }

    /// Preorder nodes satisfying `predicate`.
    pub fn filter_nodes<F>(&self, predicate: F) -> Result<Vec<String>, LineageTreeError>
    where
        F: Fn(&str) -> bool,
    {
        Ok(self
            .depth_first_traverse_nodes(None, false)?
            .into_iter()
            .filter(|n| predicate(n))
            .collect())
    }

    /// Rename nodes in place; clears the whole structural cache.
    pub fn relabel_nodes(
        &mut self,
        mapping: &HashMap<String, String>,
    ) -> Result<(), LineageTreeError> {
        self.graph_mut()?.relabel(mapping);
        self.cache.clear_topology();
        Ok(())
    }

    /// Number of cells: character-matrix rows, or the leaf count without one.
    pub fn n_cells(&self) -> Result<usize, LineageTreeError> {
        if let Some(matrix) = &self.current_matrix {
            return Ok(matrix.n_samples());
        }
        Ok(self.leaves()?.len())
    }

    /// Number of characters per state vector.
    pub fn n_characters(&self) -> Result<usize, LineageTreeError> {
        if let Some(matrix) = &self.current_matrix {
            return Ok(matrix.n_characters());
        }
        let graph = self.graph()?;
        if let Some(first) = self.leaves()?.first() {
            let states = graph.states(first).unwrap_or(&[]);
            if !states.is_empty() {
                return Ok(states.len());
            }
        }
        Err(LineageTreeError::MissingCharacterMatrix)
    }

    /// Mean leaf time.
    pub fn mean_depth(&self) -> Result<f64, LineageTreeError> {
        let leaves = self.leaves()?;
        if leaves.is_empty() {
            return Err(LineageTreeError::InvalidTopology("tree has no leaves".into()));
        }
        let total: f64 = leaves
            .iter()
            .map(|l| self.graph().map(|g| g.time(l).unwrap_or(0.0)))
            .sum::<Result<f64, _>>()?;
        Ok(total / leaves.len() as f64)
    }

    /// Maximum leaf time.
    pub fn max_depth(&self) -> Result<f64, LineageTreeError> {
        let leaves = self.leaves()?;
        if leaves.is_empty() {
            return Err(LineageTreeError::InvalidTopology("tree has no leaves".into()));
        }
        let graph = self.graph()?;
        Ok(leaves
            .iter()
            .map(|l| graph.time(l).unwrap_or(0.0))
            .fold(f64::NEG_INFINITY, f64::max))
    }

    //=== time / branch-length consistency engine ===

    /// The time of a node (sum of branch lengths from the root).
    pub fn get_time(&self, node: &str) -> Result<f64, LineageTreeError> {
        self.require_node(node)?;
        Ok(self.graph()?.time(node).unwrap_or(0.0))
    }

    /// Times of all nodes.
    pub fn get_times(&self) -> Result<HashMap<String, f64>, LineageTreeError> {
        let graph = self.graph()?;
        Ok(graph
            .node_order()
            .iter()
            .map(|n| (n.clone(), graph.time(n).unwrap_or(0.0)))
            .collect())
    }

    /// Set the time of one node, keeping the tree consistent: the incoming
    /// edge length becomes `t - time(parent)` and each outgoing edge length
    /// becomes `time(child) - t`.
    ///
    /// # Errors
    /// `NonMonotonicTime` if `t` is below the parent's time or above any
    /// child's time.
    pub fn set_time(&mut self, node: &str, new_time: f64) -> Result<(), LineageTreeError> {
        self.require_node(node)?;
        let graph = self.graph()?;
        let parent = graph.parent_of(node).map(str::to_string);
        if let Some(p) = &parent {
            let parent_time = graph.time(p).unwrap_or(0.0);
            if new_time < parent_time {
                return Err(LineageTreeError::NonMonotonicTime {
                    node: node.to_string(),
                    time: new_time,
                    other: p.clone(),
                    other_time: parent_time,
                });
            }
        }
        let children: Vec<(String, f64)> = graph
            .children_with_lengths(node)
            .iter()
            .map(|(c, _)| (c.clone(), graph.time(c).unwrap_or(0.0)))
            .collect();
        for (child, child_time) in &children {
            if new_time > *child_time {
                return Err(LineageTreeError::NonMonotonicTime {
                    node: node.to_string(),
                    time: new_time,
                    other: child.clone(),
                    other_time: *child_time,
                });
            }
        }

        let graph = self.graph_mut()?;
        graph.set_time_raw(node, new_time);
        if let Some(p) = &parent {
            let parent_time = graph.time(p).unwrap_or(0.0);
            graph.set_edge_length(p, node, new_time - parent_time);
        }
        for (child, child_time) in &children {
            graph.set_edge_length(node, child, child_time - new_time);
        }
        self.cache.clear_distances();
        Ok(())
    }

    /// Bulk time assignment. Every edge whose two endpoints are supplied is
    /// validated (`time(parent) <= time(child)`) before anything is applied,
    /// then gets its length set to the time difference; supplied times are
    /// stored afterwards. Nodes absent from the mapping keep whatever derived
    /// state they had; the caller owns completeness of the mapping.
    pub fn set_times(
        &mut self,
        times: &HashMap<String, f64>,
    ) -> Result<(), LineageTreeError> {
        for node in times.keys() {
            self.require_node(node)?;
        }
        let edges = self.edges()?;
        let mut new_lengths = Vec::new();
        for (parent, child) in &edges {
            let (Some(&tp), Some(&tc)) = (times.get(parent), times.get(child)) else {
                continue;
            };
            if tp > tc {
                return Err(LineageTreeError::NonMonotonicTime {
                    node: child.clone(),
                    time: tc,
                    other: parent.clone(),
                    other_time: tp,
                });
            }
            new_lengths.push((parent.clone(), child.clone(), tc - tp));
        }
        let graph = self.graph_mut()?;
        for (parent, child, length) in new_lengths {
            graph.set_edge_length(&parent, &child, length);
        }
        for (node, &time) in times {
            graph.set_time_raw(node, time);
        }
        self.cache.clear_distances();
        Ok(())
    }

    /// The length of an edge.
    pub fn get_branch_length(
        &self,
        parent: &str,
        child: &str,
    ) -> Result<f64, LineageTreeError> {
        self.graph()?
            .edge_length(parent, child)
            .ok_or_else(|| LineageTreeError::EdgeNotFound(parent.into(), child.into()))
    }

    /// Set the length of one edge and re-derive the time of every node in
    /// the subtree below `parent` via a preorder walk, so indirectly affected
    /// descendants stay consistent.
    ///
    /// # Errors
    /// `EdgeNotFound` or `NegativeBranchLength`.
    pub fn set_branch_length(
        &mut self,
        parent: &str,
        child: &str,
        length: f64,
    ) -> Result<(), LineageTreeError> {
        if self.graph()?.edge_length(parent, child).is_none() {
            return Err(LineageTreeError::EdgeNotFound(parent.into(), child.into()));
        }
        if length < 0.0 {
            return Err(LineageTreeError::NegativeBranchLength(length));
        }
        let graph = self.graph_mut()?;
        graph.set_edge_length(parent, child, length);
        graph.rederive_times_from(parent);
        self.cache.clear_distances();
        Ok(())
    }

    /// Bulk branch-length assignment: every edge is validated before any is
    /// applied, then all times are re-derived in one traversal from the root.
    pub fn set_branch_lengths(
        &mut self,
        lengths: &HashMap<(String, String), f64>,
    ) -> Result<(), LineageTreeError> {
        for ((parent, child), &length) in lengths {
            if self.graph()?.edge_length(parent, child).is_none() {
                return Err(LineageTreeError::EdgeNotFound(
                    parent.clone(),
                    child.clone(),
                ));
            }
            if length < 0.0 {
                return Err(LineageTreeError::NegativeBranchLength(length));
            }
        }
        let root = self.root()?;
        let graph = self.graph_mut()?;
        for ((parent, child), &length) in lengths {
            graph.set_edge_length(parent, child, length);
        }
        graph.rederive_times_from(&root);
        self.cache.clear_distances();
        Ok(())
    }

    //=== character state store ===

    /// A copy of the node's state vector.
    pub fn get_character_states(
        &self,
        node: &str,
    ) -> Result<Vec<CharacterState>, LineageTreeError> {
        self.require_node(node)?;
        Ok(self.graph()?.states(node).unwrap_or(&[]).to_vec())
    }

    /// Set a node's state vector.
    ///
    /// Leaf edits additionally require the leaf to have been initialized (so
    /// leaf data cannot be fabricated outside ingestion) and update the
    /// corresponding row of the current character matrix.
    pub fn set_character_states(
        &mut self,
        node: &str,
        states: Vec<CharacterState>,
    ) -> Result<(), LineageTreeError> {
        self.require_node(node)?;
        let expected = self.n_characters()?;
        if states.len() != expected {
            return Err(LineageTreeError::CharacterVectorLength {
                expected,
                found: states.len(),
            });
        }
        let is_leaf = self.is_leaf(node)?;
        if is_leaf && self.get_character_states(node)?.is_empty() {
            return Err(LineageTreeError::UninitializedLeafStates(node.to_string()));
        }
        self.set_states_internal(node, states, is_leaf)
    }

    /// Write states without the public-API validation; keeps the current
    /// matrix row in sync for leaves.
    pub(crate) fn set_states_internal(
        &mut self,
        node: &str,
        states: Vec<CharacterState>,
        is_leaf: bool,
    ) -> Result<(), LineageTreeError> {
        if is_leaf {
            if let Some(matrix) = &mut self.current_matrix {
                matrix.set_row(node, states.clone())?;
            }
        }
        self.graph_mut()?.set_states_raw(node, states);
        Ok(())
    }

    /// True iff any state entry of `node` is an unresolved multi-value.
    pub fn is_ambiguous(&self, node: &str) -> Result<bool, LineageTreeError> {
        Ok(self
            .get_character_states(node)?
            .iter()
            .any(CharacterState::is_ambiguous))
    }

    /// Deduplicate every ambiguous entry to its distinct candidates.
    /// Idempotent; a no-op on trees without ambiguity.
    pub fn collapse_ambiguous_characters(&mut self) -> Result<(), LineageTreeError> {
        for node in self.nodes()? {
            let states = self.get_character_states(&node)?;
            let collapsed: Vec<CharacterState> =
                states.iter().map(CharacterState::collapse).collect();
            if collapsed != states {
                let is_leaf = self.is_leaf(&node)?;
                self.set_states_internal(&node, collapsed, is_leaf)?;
            }
        }
        Ok(())
    }

    /// Resolve every ambiguous entry to the most frequent candidate, breaking
    /// ties uniformly with the injected randomness source.
    pub fn resolve_ambiguous_characters<R: Rng>(
        &mut self,
        rng: &mut R,
    ) -> Result<(), LineageTreeError> {
        let mut resolver = |candidates: &[i64]| -> i64 {
            let mut counts: Vec<(i64, usize)> = Vec::new();
            for &c in candidates {
                if let Some(entry) = counts.iter_mut().find(|(v, _)| *v == c) {
                    entry.1 += 1;
                } else {
                    counts.push((c, 1));
                }
            }
            let best = counts.iter().map(|&(_, n)| n).max().unwrap_or(0);
            let ties: Vec<i64> = counts
                .iter()
                .filter(|&&(_, n)| n == best)
                .map(|&(v, _)| v)
                .collect();
            ties.choose(rng).copied().unwrap_or(0)
        };
        self.resolve_with(&mut resolver)
    }

    /// Resolve every ambiguous entry with a caller-supplied function over the
    /// candidate multiset.
    pub fn resolve_ambiguous_characters_with<F>(
        &mut self,
        mut resolver: F,
    ) -> Result<(), LineageTreeError>
    where
        F: FnMut(&[i64]) -> i64,
    {
        self.resolve_with(&mut resolver)
    }

    fn resolve_with(
        &mut self,
        resolver: &mut dyn FnMut(&[i64]) -> i64,
    ) -> Result<(), LineageTreeError> {
        for node in self.nodes()? {
            let states = self.get_character_states(&node)?;
            if !states.iter().any(CharacterState::is_ambiguous) {
                continue;
            }
            let resolved: Vec<CharacterState> = states
                .iter()
                .map(|s| match s {
                    CharacterState::Ambiguous(candidates) => {
                        CharacterState::Scalar(resolver(candidates))
                    }
                    other => other.clone(),
                })
                .collect();
            let is_leaf = self.is_leaf(&node)?;
            self.set_states_internal(&node, resolved, is_leaf)?;
        }
        Ok(())
    }

    /// Reconstruct internal-node states bottom-up under irreversible
    /// parsimony (see [`lca_characters`]); leaves are untouched.
    ///
    /// # Errors
    /// `UninitializedLeafStates` if any leaf has an empty state vector.
    pub fn reconstruct_ancestral_characters(&mut self) -> Result<(), LineageTreeError> {
        for node in self.depth_first_traverse_nodes(None, true)? {
            if self.is_leaf(&node)? {
                if self.get_character_states(&node)?.is_empty() {
                    return Err(LineageTreeError::UninitializedLeafStates(node));
                }
                continue;
            }
            let children = self.children(&node)?;
            let vectors: Vec<Vec<CharacterState>> = children
                .iter()
                .map(|c| self.get_character_states(c))
                .collect::<Result<_, _>>()?;
            let refs: Vec<&[CharacterState]> = vectors.iter().map(Vec::as_slice).collect();
            let reconstructed = lca_characters(&refs);
            self.graph_mut()?.set_states_raw(&node, reconstructed);
        }
        Ok(())
    }

    /// `(character, child state)` for every position where parent and child
    /// vectors differ along an edge.
    pub fn get_mutations_along_edge(
        &self,
        parent: &str,
        child: &str,
    ) -> Result<Vec<(usize, CharacterState)>, LineageTreeError> {
        if self.graph()?.edge_length(parent, child).is_none() {
            return Err(LineageTreeError::EdgeNotFound(parent.into(), child.into()));
        }
        let parent_states = self.get_character_states(parent)?;
        let child_states = self.get_character_states(child)?;
        Ok(parent_states
            .iter()
            .zip(child_states.iter())
            .enumerate()
            .filter(|(_, (p, c))| p != c)
            .map(|(i, (_, c))| (i, c.clone()))
            .collect())
    }

    /// A copy of the current (leaf-synchronized) character matrix.
    pub fn character_matrix(&self) -> Result<CharacterMatrix, LineageTreeError> {
        self.current_matrix
            .clone()
            .ok_or(LineageTreeError::MissingCharacterMatrix)
    }

    /// A copy of the matrix as ingested, untouched by later edits.
    pub fn original_character_matrix(&self) -> Result<CharacterMatrix, LineageTreeError> {
        self.original_matrix
            .clone()
            .ok_or(LineageTreeError::MissingCharacterMatrix)
    }

    //=== per-node attributes ===

    /// Attach a named attribute to a node.
    pub fn set_attribute(
        &mut self,
        node: &str,
        name: &str,
        value: AttributeValue,
    ) -> Result<(), LineageTreeError> {
        self.require_node(node)?;
        self.graph_mut()?.set_attribute_raw(node, name, value);
        Ok(())
    }

    /// Read a named attribute of a node.
    ///
    /// # Errors
    /// `MissingAttribute` if it was never set on this node.
    pub fn get_attribute(
        &self,
        node: &str,
        name: &str,
    ) -> Result<AttributeValue, LineageTreeError> {
        self.require_node(node)?;
        self.graph()?
            .attribute(node, name)
            .cloned()
            .ok_or_else(|| LineageTreeError::MissingAttribute {
                node: node.to_string(),
                attribute: name.to_string(),
            })
    }

    //=== serialization ===

    /// Bracket-notation form of the tree.
    ///
    /// # Errors
    /// `ReservedCharacter` if any node identifier contains `,`.
    pub fn to_newick(&self, record_branch_lengths: bool) -> Result<String, LineageTreeError> {
        let root = self.root()?;
        crate::algs::newick::to_newick(self.graph()?, &root, record_branch_lengths)
    }

    /// Node/edge snapshot of the current topology with branch lengths.
    pub fn topology_snapshot(&self) -> Result<RawTopology, LineageTreeError> {
        Ok(self.graph()?.to_raw())
    }
}
