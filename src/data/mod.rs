//! Per-node and per-leaf data: character states, matrices, dissimilarities,
//! and auxiliary metadata tables.

pub mod annotations;
pub mod dissimilarity;
pub mod matrix;
pub mod state;

pub use annotations::{AnnotationTable, MetaValue};
pub use dissimilarity::{DissimilarityMap, PriorTransformation, PriorWeights, Priors};
pub use matrix::CharacterMatrix;
pub use state::CharacterState;
