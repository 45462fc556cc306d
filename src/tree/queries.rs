//! Lowest-common-ancestor and distance queries, plus dissimilarity-map
//! orchestration.
//!
//! LCA batches run offline over the whole tree instead of walking root-to-node
//! per pair; distances derive from node times through the shared-path formula
//! `d(a, b) = (time(a) - time(lca)) + (time(b) - time(lca))` and are memoized
//! per source node until the next time or topology mutation.

use std::collections::{BTreeSet, HashMap, HashSet};

use itertools::Itertools;

use crate::algs::lca::lcas_of_pairs;
use crate::data::dissimilarity::{
    DissimilarityMap, PriorTransformation, PriorWeights, compute_pairwise_dissimilarities,
    transform_priors,
};
use crate::data::state::CharacterState;
use crate::tree::LineageTree;
use crate::tree_error::LineageTreeError;

impl LineageTree {
    /// LCAs of the requested unordered pairs (or of every pair of nodes when
    /// `pairs` is `None`), resolved in one offline pass over the tree.
    pub fn find_lcas_of_pairs(
        &self,
        pairs: Option<&[(String, String)]>,
    ) -> Result<Vec<((String, String), String)>, LineageTreeError> {
        let root = self.root()?;
        let all_pairs;
        let pairs: &[(String, String)] = match pairs {
            Some(pairs) => {
                for (a, b) in pairs {
                    self.require_node(a)?;
                    self.require_node(b)?;
                }
                pairs
            }
            None => {
                all_pairs = self
                    .nodes()?
                    .into_iter()
                    .tuple_combinations()
                    .collect::<Vec<(String, String)>>();
                &all_pairs
            }
        };
        Ok(lcas_of_pairs(self.graph()?, &root, pairs))
    }

    /// LCA of an arbitrary node set, found by repeatedly replacing the set
    /// with the LCAs of all its pairs until one node remains.
    ///
    /// # Errors
    /// `LcaRequiresTwoNodes` if fewer than two distinct nodes are given.
    pub fn find_lca<S: AsRef<str>>(&self, nodes: &[S]) -> Result<String, LineageTreeError> {
        let mut current: BTreeSet<String> = nodes
            .iter()
            .map(|n| n.as_ref().to_string())
            .collect();
        if current.len() < 2 {
            return Err(LineageTreeError::LcaRequiresTwoNodes);
        }
        for node in &current {
            self.require_node(node)?;
        }
        let root = self.root()?;
        while current.len() > 1 {
            let pairs: Vec<(String, String)> = current
                .iter()
                .cloned()
                .tuple_combinations()
                .collect();
            current = lcas_of_pairs(self.graph()?, &root, &pairs)
                .into_iter()
                .map(|(_, lca)| lca)
                .collect();
        }
        current
            .into_iter()
            .next()
            .ok_or_else(|| LineageTreeError::InvalidTopology("LCA reduction emptied".into()))
    }

    /// Path distance between two nodes via their LCA's time; 0 when they are
    /// the same node. Cached per unordered pair.
    pub fn get_distance(&self, a: &str, b: &str) -> Result<f64, LineageTreeError> {
        self.require_node(a)?;
        self.require_node(b)?;
        let cached = self
            .cache
            .distances
            .read()
            .get(a)
            .and_then(|m| m.get(b))
            .copied();
        if let Some(d) = cached {
            return Ok(d);
        }
        let d = if a == b {
            0.0
        } else {
            let lca = self.find_lca(&[a, b])?;
            let lca_time = self.get_time(&lca)?;
            (self.get_time(a)? - lca_time) + (self.get_time(b)? - lca_time)
        };
        self.cache
            .distances
            .write()
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string(), d);
        Ok(d)
    }

    /// Distances from `node` to every other node in one sweep: descendants by
    /// time difference on a single downward walk, everything else by walking
    /// the ancestor chain and descending into each ancestor's other subtrees.
    /// Asymptotically cheaper than pairwise `get_distance` calls; cached per
    /// source node. `leaves_only` filters the result to leaves.
    pub fn get_distances(
        &self,
        node: &str,
        leaves_only: bool,
    ) -> Result<HashMap<String, f64>, LineageTreeError> {
        self.require_node(node)?;
        let nodes = self.nodes()?;
        let complete = self
            .cache
            .distances
            .read()
            .get(node)
            .is_some_and(|m| nodes.iter().all(|n| m.contains_key(n)));

        if !complete {
            let mut distances: HashMap<String, f64> = HashMap::new();
            let node_time = self.get_time(node)?;
            for descendant in self.depth_first_traverse_nodes(Some(node), false)? {
                let t = self.get_time(&descendant)?;
                distances.insert(descendant, t - node_time);
            }
            if !self.is_root(node)? {
                for ancestor in self.get_all_ancestors(node)? {
                    let ancestor_time = self.get_time(&ancestor)?;
                    let ancestor_distance = node_time - ancestor_time;
                    distances.insert(ancestor.clone(), ancestor_distance);
                    for descendant in
                        self.depth_first_traverse_nodes(Some(&ancestor), false)?
                    {
                        if !distances.contains_key(&descendant) {
                            let t = self.get_time(&descendant)?;
                            distances
                                .insert(descendant, ancestor_distance + (t - ancestor_time));
                        }
                    }
                }
            }
            self.cache
                .distances
                .write()
                .insert(node.to_string(), distances);
        }

        let map = self
            .cache
            .distances
            .read()
            .get(node)
            .cloned()
            .unwrap_or_default();
        if leaves_only {
            let leaves: HashSet<String> = self.leaves()?.into_iter().collect();
            Ok(map
                .into_iter()
                .filter(|(n, _)| leaves.contains(n))
                .collect())
        } else {
            Ok(map)
        }
    }

    //=== dissimilarity orchestration ===

    /// A copy of the dissimilarity map, if one is set.
    pub fn get_dissimilarity_map(&self) -> Option<DissimilarityMap> {
        self.dissimilarity_map.clone()
    }

    /// Install a dissimilarity map. A sample set disagreeing with the
    /// character matrix is advisory only and logged, not rejected.
    pub fn set_dissimilarity_map(&mut self, map: DissimilarityMap) {
        if let Some(matrix) = &self.current_matrix {
            let mut matrix_samples = matrix.sample_names();
            let mut map_samples = map.samples();
            matrix_samples.sort();
            map_samples.sort();
            if matrix_samples != map_samples {
                log::warn!(
                    "samples in the character matrix and the supplied dissimilarity map \
                     do not agree"
                );
            }
        }
        self.dissimilarity_map = Some(map);
    }

    /// Compute pairwise dissimilarities over the current character matrix
    /// with a pluggable scoring function, transforming any stored priors into
    /// weights first, and install the result.
    ///
    /// Ambiguous states force the scorers onto their slower
    /// candidate-averaging path; that is logged as a warning.
    pub fn compute_dissimilarity_map<F>(
        &mut self,
        scorer: F,
        prior_transformation: PriorTransformation,
    ) -> Result<(), LineageTreeError>
    where
        F: Fn(&[CharacterState], &[CharacterState], i64, Option<&PriorWeights>) -> f64,
    {
        let matrix = self
            .current_matrix
            .clone()
            .ok_or(LineageTreeError::MissingCharacterMatrix)?;
        if matrix.has_ambiguous() {
            log::warn!("character matrix contains ambiguous states");
        }
        let weights = match &self.priors {
            Some(priors) => Some(transform_priors(priors, prior_transformation)?),
            None => None,
        };
        let map = compute_pairwise_dissimilarities(
            &matrix,
            scorer,
            self.missing_state_indicator(),
            weights.as_ref(),
        );
        self.set_dissimilarity_map(map);
        Ok(())
    }
}
