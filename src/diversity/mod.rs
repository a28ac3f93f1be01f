//! Diversity estimation: per-sample alpha measures and pairwise
//! dissimilarity matrices over community datasets.

pub mod alpha;
pub mod dissimilarity;
pub(crate) mod unifrac;

pub use alpha::{
    estimate_richness, inverse_simpson, observed, shannon, AlphaDiversity, AlphaMeasure,
};
pub use dissimilarity::{
    bray_curtis, jaccard, pairwise_distance, Axis, DissimilarityMatrix, DistanceMetric,
};
