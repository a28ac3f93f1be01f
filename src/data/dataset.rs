//! The linked multi-table community dataset.

use crate::data::{AbundanceTable, PhyloTree, SampleData, TaxonomyTable, Variable};
use crate::error::{EcoError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A validated, immutable container linking an abundance table with sample
/// metadata and optional taxonomy and phylogenetic tree.
///
/// Every transform in this crate consumes a `&CommunityDataSet` and returns a
/// fresh one passing through [`CommunityDataSet::new`], so the cross-table
/// invariants hold for every reachable value and no operation observes a
/// partially updated dataset.
#[derive(Debug, Clone)]
pub struct CommunityDataSet {
    abundance: AbundanceTable,
    samples: SampleData,
    taxonomy: Option<TaxonomyTable>,
    tree: Option<PhyloTree>,
}

/// Plain per-axis summary emitted for presentation collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub n_taxa: usize,
    pub n_samples: usize,
    pub total_abundance: f64,
    pub sample_ids: Vec<String>,
    pub sample_sums: Vec<f64>,
    pub taxon_ids: Vec<String>,
    pub taxon_sums: Vec<f64>,
    pub has_taxonomy: bool,
    pub has_tree: bool,
}

impl CommunityDataSet {
    /// Assemble and validate a dataset.
    ///
    /// Checks, beyond what each table validates for itself:
    /// - metadata sample set equals the abundance sample axis (metadata is
    ///   reordered to the abundance axis);
    /// - taxonomy rows are a subset of the abundance taxon axis, with a
    ///   non-empty intersection;
    /// - tree tips are a subset of the abundance taxon axis, with a
    ///   non-empty intersection.
    pub fn new(
        abundance: AbundanceTable,
        samples: SampleData,
        taxonomy: Option<TaxonomyTable>,
        tree: Option<PhyloTree>,
    ) -> Result<Self> {
        for sid in abundance.sample_ids() {
            if !samples.has_sample(sid) {
                return Err(EcoError::MalformedDataset(format!(
                    "sample '{}' has abundances but no metadata",
                    sid
                )));
            }
        }
        for sid in samples.sample_ids() {
            if abundance.sample_index(sid).is_none() {
                return Err(EcoError::MalformedDataset(format!(
                    "sample '{}' has metadata but no abundances",
                    sid
                )));
            }
        }
        let samples = samples.align_to(abundance.sample_ids())?;

        let taxon_axis: HashSet<&str> = abundance.taxon_ids().iter().map(|s| s.as_str()).collect();

        if let Some(tax) = &taxonomy {
            let mut overlap = 0usize;
            for tid in tax.taxon_ids() {
                if taxon_axis.contains(tid.as_str()) {
                    overlap += 1;
                } else {
                    return Err(EcoError::MalformedDataset(format!(
                        "taxonomy row '{}' is not on the abundance taxon axis",
                        tid
                    )));
                }
            }
            if overlap == 0 {
                return Err(EcoError::MalformedDataset(
                    "taxonomy shares no taxa with the abundance table".to_string(),
                ));
            }
        }

        if let Some(tree) = &tree {
            let mut overlap = 0usize;
            for label in tree.tip_labels() {
                if taxon_axis.contains(label) {
                    overlap += 1;
                } else {
                    return Err(EcoError::MalformedDataset(format!(
                        "tree tip '{}' is not on the abundance taxon axis",
                        label
                    )));
                }
            }
            if overlap == 0 {
                return Err(EcoError::MalformedDataset(
                    "tree shares no tips with the abundance table".to_string(),
                ));
            }
        }

        Ok(Self {
            abundance,
            samples,
            taxonomy,
            tree,
        })
    }

    /// The abundance table.
    pub fn abundance(&self) -> &AbundanceTable {
        &self.abundance
    }

    /// The sample metadata, ordered like the abundance sample axis.
    pub fn samples(&self) -> &SampleData {
        &self.samples
    }

    /// The taxonomy table, if any.
    pub fn taxonomy(&self) -> Option<&TaxonomyTable> {
        self.taxonomy.as_ref()
    }

    /// The phylogenetic tree, if any.
    pub fn tree(&self) -> Option<&PhyloTree> {
        self.tree.as_ref()
    }

    /// Number of samples.
    pub fn sample_count(&self) -> usize {
        self.abundance.n_samples()
    }

    /// Number of taxa.
    pub fn taxon_count(&self) -> usize {
        self.abundance.n_taxa()
    }

    /// Total abundance of one sample. Fails for an unknown sample id.
    pub fn sample_sum(&self, sample_id: &str) -> Result<f64> {
        let col = self.abundance.sample_index(sample_id).ok_or_else(|| {
            EcoError::InvalidParameter(format!("unknown sample id '{}'", sample_id))
        })?;
        Ok(self.abundance.col_dense(col).iter().sum())
    }

    /// Total abundance of one taxon. Fails for an unknown taxon id.
    pub fn taxon_sum(&self, taxon_id: &str) -> Result<f64> {
        let row = self
            .abundance
            .taxon_index(taxon_id)
            .ok_or_else(|| EcoError::InvalidParameter(format!("unknown taxon id '{}'", taxon_id)))?;
        Ok(self.abundance.row_dense(row).iter().sum())
    }

    /// All values of a metadata variable, in sample-axis order.
    ///
    /// Fails with `UnknownVariable` if the column does not exist.
    pub fn variable(&self, name: &str) -> Result<Vec<&Variable>> {
        self.samples.column(name)
    }

    /// Per-axis totals for presentation collaborators.
    pub fn summary(&self) -> DatasetSummary {
        let sample_sums = self.abundance.sample_sums();
        let taxon_sums = self.abundance.taxon_sums();
        DatasetSummary {
            n_taxa: self.taxon_count(),
            n_samples: self.sample_count(),
            total_abundance: sample_sums.iter().sum(),
            sample_ids: self.abundance.sample_ids().to_vec(),
            sample_sums,
            taxon_ids: self.abundance.taxon_ids().to_vec(),
            taxon_sums,
            has_taxonomy: self.taxonomy.is_some(),
            has_tree: self.tree.is_some(),
        }
    }

    /// The tree, or `MissingTree` naming the operation that needs it.
    pub fn require_tree(&self, operation: &str) -> Result<&PhyloTree> {
        self.tree
            .as_ref()
            .ok_or_else(|| EcoError::MissingTree(operation.to_string()))
    }

    /// The tree, additionally checked to cover every abundance taxon.
    pub fn require_covering_tree(&self, operation: &str) -> Result<&PhyloTree> {
        let tree = self.require_tree(operation)?;
        for tid in self.abundance.taxon_ids() {
            if !tree.has_tip(tid) {
                return Err(EcoError::MalformedDataset(format!(
                    "'{}' requires full tree coverage, but taxon '{}' is not a tree tip",
                    operation, tid
                )));
            }
        }
        Ok(tree)
    }

    /// The taxonomy, checked to cover every abundance taxon.
    pub fn require_covering_taxonomy(&self, operation: &str) -> Result<&TaxonomyTable> {
        let tax = self.taxonomy.as_ref().ok_or_else(|| {
            EcoError::MalformedDataset(format!("'{}' requires a taxonomy table", operation))
        })?;
        for tid in self.abundance.taxon_ids() {
            if !tax.has_taxon(tid) {
                return Err(EcoError::MalformedDataset(format!(
                    "'{}' requires full taxonomy coverage, but taxon '{}' has no row",
                    operation, tid
                )));
            }
        }
        Ok(tax)
    }
}
