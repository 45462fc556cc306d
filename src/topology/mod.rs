//! Topology storage, caching, and traversal for rooted lineage trees.

pub mod cache;
pub mod graph;
pub(crate) mod traversal;

pub use cache::InvalidateCache;
pub use graph::{AttributeValue, RawEdge, RawTopology};
