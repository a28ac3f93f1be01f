//! Agglomeration: grouping and collapsing samples or taxa.

mod rank;
mod samples;
mod taxa;
mod tip;

pub use rank::tax_glom;
pub use samples::{merge_samples, CategoricalMerge};
pub use taxa::{merge_taxa, merge_taxa_legacy};
pub use tip::tip_glom;

use crate::data::{AbundanceTable, CommunityDataSet};
use crate::error::{EcoError, Result};
use std::collections::HashSet;

/// Sum abundance rows within each group of taxa.
///
/// `groups` lists, per surviving row, the representative taxon id and the
/// member row indices to sum. Rows come out in group order.
pub(crate) fn sum_taxon_groups(
    abundance: &AbundanceTable,
    groups: &[(String, Vec<usize>)],
) -> Result<AbundanceTable> {
    let n_samples = abundance.n_samples();
    let mut triplets = Vec::new();
    let mut taxon_ids = Vec::with_capacity(groups.len());

    for (new_row, (rep_id, members)) in groups.iter().enumerate() {
        taxon_ids.push(rep_id.clone());
        for &member in members {
            for (col, val) in abundance.row_dense(member).into_iter().enumerate() {
                if val != 0.0 {
                    triplets.push((new_row, col, val));
                }
            }
        }
    }

    AbundanceTable::from_triplets(
        (groups.len(), n_samples),
        &triplets,
        taxon_ids,
        abundance.sample_ids().to_vec(),
    )
}

/// Assemble a dataset whose taxon axis was collapsed to `abundance`,
/// restricting taxonomy and pruning the tree to the surviving taxa.
pub(crate) fn rebuild_collapsed(
    ds: &CommunityDataSet,
    abundance: AbundanceTable,
    operation: &str,
) -> Result<CommunityDataSet> {
    let kept: HashSet<&str> = abundance.taxon_ids().iter().map(|s| s.as_str()).collect();

    let taxonomy = ds.taxonomy().map(|tax| tax.restrict_to(&kept));

    let tree = match ds.tree() {
        Some(tree) => {
            let survivors: HashSet<&str> = tree
                .tip_labels()
                .into_iter()
                .filter(|l| kept.contains(l))
                .collect();
            if survivors.is_empty() {
                return Err(EcoError::MalformedDataset(format!(
                    "{} removed every tree tip",
                    operation
                )));
            }
            Some(tree.retain_tips(&survivors)?)
        }
        None => None,
    };

    CommunityDataSet::new(abundance, ds.samples().clone(), taxonomy, tree)
}
