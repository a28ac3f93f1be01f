//! Predicate- and function-driven transforms over a [`CommunityDataSet`].
//!
//! Every function here consumes a dataset by reference and returns a new,
//! re-validated one; nothing mutates in place.

mod counts;
mod filter;
mod prune;
mod subset;

pub use counts::{relative_abundance, transform_sample_counts};
pub use filter::filter_taxa;
pub use prune::{prune_samples, prune_taxa};
pub use subset::{subset_samples, subset_taxa};

use crate::data::CommunityDataSet;
use crate::error::{EcoError, Result};
use std::collections::HashSet;

/// Rebuild a dataset keeping only the taxa at `indices` (abundance order).
///
/// Restricts the taxonomy and prunes the tree to the surviving taxa so the
/// cross-table invariants keep holding.
pub(crate) fn rebuild_with_taxa(
    ds: &CommunityDataSet,
    indices: &[usize],
    operation: &str,
) -> Result<CommunityDataSet> {
    if indices.is_empty() {
        return Err(EcoError::EmptySelection(format!(
            "{} retained zero taxa",
            operation
        )));
    }

    let abundance = ds.abundance().subset_taxa(indices)?;
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

/// Rebuild a dataset keeping only the samples at `indices` (abundance order).
pub(crate) fn rebuild_with_samples(
    ds: &CommunityDataSet,
    indices: &[usize],
    operation: &str,
) -> Result<CommunityDataSet> {
    if indices.is_empty() {
        return Err(EcoError::EmptySelection(format!(
            "{} retained zero samples",
            operation
        )));
    }

    let abundance = ds.abundance().subset_samples(indices)?;
    let samples = ds.samples().subset_samples(abundance.sample_ids())?;
    CommunityDataSet::new(
        abundance,
        samples,
        ds.taxonomy().cloned(),
        ds.tree().cloned(),
    )
}
