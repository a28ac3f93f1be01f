//! Community Ecology Analysis Library
//!
//! This library provides composable primitives for analyzing community
//! sequencing data: linked abundance, metadata, taxonomy and phylogeny
//! tables with the common ecology workflows built on top.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Core data structures (AbundanceTable, SampleData, TaxonomyTable, PhyloTree, CommunityDataSet)
//! - **transform**: Pruning, subsetting, filtering and count transformation
//! - **glom**: Agglomeration across samples, taxa, tree tips and taxonomic ranks
//! - **diversity**: Alpha diversity and pairwise dissimilarity (Bray-Curtis, Jaccard, UniFrac)
//! - **ordinate**: NMDS and PCoA ordination of dissimilarity matrices
//! - **network**: Threshold co-occurrence graphs
//!
//! # Example
//!
//! ```no_run
//! use community_ecology::prelude::*;
//!
//! // Load linked tables
//! let abundance = AbundanceTable::from_tsv("abundance.tsv").unwrap();
//! let samples = SampleData::from_tsv("samples.tsv").unwrap();
//! let ds = CommunityDataSet::new(abundance, samples, None, None).unwrap();
//!
//! // Keep prevalent taxa, convert to proportions, ordinate
//! let ds = filter_taxa(&ds, |row| row.iter().filter(|&&v| v > 0.0).count() >= 2, true).unwrap();
//! let ds = relative_abundance(&ds).unwrap();
//! let dm = pairwise_distance(&ds, DistanceMetric::BrayCurtis, Axis::Samples).unwrap();
//! let ord = ordinate(&dm, OrdinationMethod::Nmds, 2, &NmdsConfig::default()).unwrap();
//! println!("stress = {}", ord.stress);
//! ```

pub mod data;
pub mod diversity;
pub mod error;
pub mod glom;
pub mod network;
pub mod ordinate;
pub mod transform;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::data::{
        AbundanceTable, CommunityDataSet, DatasetSummary, PhyloTree, SampleData, SampleRecord,
        TaxonRecord, TaxonomyTable, TreeNode, Variable, VariableType,
    };
    pub use crate::diversity::{
        bray_curtis, estimate_richness, inverse_simpson, jaccard, observed, pairwise_distance,
        shannon, AlphaDiversity, AlphaMeasure, Axis, DissimilarityMatrix, DistanceMetric,
    };
    pub use crate::error::{EcoError, Result};
    pub use crate::glom::{
        merge_samples, merge_taxa, merge_taxa_legacy, tax_glom, tip_glom, CategoricalMerge,
    };
    pub use crate::network::{build_threshold_graph, Graph};
    pub use crate::ordinate::{
        nmds, nmds_with_cancel, ordinate, pcoa, NmdsConfig, OrdinationMethod, OrdinationResult,
    };
    pub use crate::transform::{
        filter_taxa, prune_samples, prune_taxa, relative_abundance, subset_samples, subset_taxa,
        transform_sample_counts,
    };
}
