//! LineageTreeError: unified error type for lineage-tree public APIs
//!
//! Every fallible operation in the crate reports through this enum so callers
//! get robust, non-panicking error handling across the whole public surface.

use thiserror::Error;

/// Unified error type for lineage-tree operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LineageTreeError {
    /// A structural query or mutation was attempted before a topology exists.
    #[error("tree has not been initialized")]
    UninitializedTree,
    /// No character matrix has been supplied to the tree.
    #[error("character matrix does not exist")]
    MissingCharacterMatrix,
    /// The ingested topology is not a single rooted tree.
    #[error("invalid topology: {0}")]
    InvalidTopology(String),
    /// A referenced node is not present in the tree.
    #[error("node `{0}` does not exist")]
    NodeNotFound(String),
    /// A referenced edge is not present in the tree.
    #[error("edge `{0}` -> `{1}` does not exist")]
    EdgeNotFound(String, String),
    /// A node with this identifier already exists.
    #[error("node `{0}` already exists")]
    DuplicateNode(String),
    /// Leaves may not acquire children; see `add_leaf`.
    #[error("cannot add a leaf under leaf `{0}`")]
    LeafParent(String),
    /// The operation requires a leaf node.
    #[error("node `{0}` is not a leaf")]
    NotALeaf(String),
    /// A character vector did not match the tree's character count.
    #[error("character vector has length {found}, expected {expected}")]
    CharacterVectorLength { expected: usize, found: usize },
    /// Leaf states must be initialized through ingestion before being edited.
    #[error("character states of leaf `{0}` have not been initialized")]
    UninitializedLeafStates(String),
    /// Every row label of a character matrix must be a distinct sample name.
    #[error("character matrix row `{0}` is duplicated")]
    DuplicateMatrixRow(String),
    /// The supplied leaf-indexed table does not cover the expected node set.
    #[error("{0}")]
    SampleSetMismatch(String),
    /// Branch lengths are non-negative by definition.
    #[error("branch length must be non-negative, got {0}")]
    NegativeBranchLength(f64),
    /// A time assignment violated monotonicity along an edge.
    #[error("time {time} of `{node}` violates monotonicity against `{other}` ({other_time})")]
    NonMonotonicTime {
        node: String,
        time: f64,
        other: String,
        other_time: f64,
    },
    /// Multi-node LCA needs at least two distinct nodes.
    #[error("at least two distinct nodes must be provided")]
    LcaRequiresTwoNodes,
    /// Node identifiers containing the list separator cannot be serialized.
    #[error("node `{0}` contains the reserved separator `,`")]
    ReservedCharacter(String),
    /// A per-node attribute was read before ever being set.
    #[error("attribute `{attribute}` not set for node `{node}`")]
    MissingAttribute { node: String, attribute: String },
    /// A prior probability outside (0, 1] cannot be transformed into a weight.
    #[error("prior probability {0} is not in (0, 1]")]
    InvalidPrior(f64),
    /// The bracket-notation input could not be parsed.
    #[error("malformed newick string at byte {position}: {reason}")]
    MalformedNewick { position: usize, reason: String },
}
