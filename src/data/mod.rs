//! Core data structures for linked community-sequencing data.

pub mod abundance;
pub mod dataset;
pub mod sample_data;
pub mod taxonomy;
pub mod tree;

pub use abundance::AbundanceTable;
pub use dataset::{CommunityDataSet, DatasetSummary};
pub use sample_data::{SampleData, SampleRecord, Variable, VariableType};
pub use taxonomy::{TaxonRecord, TaxonomyTable};
pub use tree::{PhyloTree, TreeNode};
