//! # lineage-tree
//!
//! lineage-tree is an in-memory phylogenetic tree engine for cell-lineage
//! reconstruction from discrete character-state observations (indel
//! barcodes). It provides the data structure that solvers, branch-length
//! estimators, and statistics modules operate on: a rooted tree whose nodes
//! carry mutable character-state vectors and time annotations, whose edges
//! carry branch lengths, and which keeps `time(child) = time(parent) +
//! length(parent, child)` intact under a rich set of topology-editing
//! operations while serving repeated structural queries from an
//! invalidation-safe cache.
//!
//! ## Features
//! - Topology store with string node identifiers and deterministic listings
//! - Time/branch-length consistency engine (set either; the other is derived)
//! - Character states with missing and ambiguous (multi-candidate) encodings
//! - Ancestral reconstruction under irreversible (Camin-Sokal) parsimony
//! - Topology surgery: leaf insertion/removal, unifurcation and
//!   mutationless-edge collapsing, with leaf-data resynchronization
//! - Offline LCA batches and memoized distance queries
//! - Bracket-notation (Newick) serialization and a convenience reader
//!
//! ## Determinism
//!
//! Node listings and traversals follow insertion/child order, so queries are
//! reproducible. The only randomized decision, the ambiguous-state tie-break,
//! takes a caller-injected `Rng`; unit tests fix `SmallRng` seeds.
//!
//! ## Concurrency
//!
//! A tree instance is a unit of exclusive mutable state. Cache coherence is
//! maintained by invalidate-on-mutation, not by synchronization; share a tree
//! across threads only behind external locking.

pub mod algs;
pub mod data;
pub mod topology;
pub mod tree;
pub mod tree_error;

pub use tree::{LineageTree, lca_characters};
pub use tree_error::LineageTreeError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::data::annotations::{AnnotationTable, MetaValue};
    pub use crate::data::dissimilarity::{
        DissimilarityMap, PriorTransformation, PriorWeights, Priors, hamming_distance,
        transform_priors, weighted_hamming_distance,
    };
    pub use crate::data::matrix::CharacterMatrix;
    pub use crate::data::state::{CharacterState, states_from_raw};
    pub use crate::topology::cache::InvalidateCache;
    pub use crate::topology::graph::{AttributeValue, RawEdge, RawTopology};
    pub use crate::tree::{DEFAULT_MISSING_STATE, LineageTree, lca_characters};
    pub use crate::tree_error::LineageTreeError;
}
