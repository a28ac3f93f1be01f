//! Record-predicate subsetting of samples and taxa.
//!
//! Predicates are ordinary closures over typed records, resolved when the
//! caller writes them, not by column-name lookup at call time.

use super::{rebuild_with_samples, rebuild_with_taxa};
use crate::data::{CommunityDataSet, SampleRecord, TaxonRecord};
use crate::error::{EcoError, Result};

/// Retain the samples whose metadata record satisfies `pred`.
///
/// Fails with `EmptySelection` when nothing survives.
pub fn subset_samples<F>(ds: &CommunityDataSet, pred: F) -> Result<CommunityDataSet>
where
    F: Fn(&SampleRecord<'_>) -> bool,
{
    let indices: Vec<usize> = ds
        .abundance()
        .sample_ids()
        .iter()
        .enumerate()
        .filter(|(_, sid)| {
            ds.samples()
                .record(sid)
                .map(|rec| pred(&rec))
                .unwrap_or(false)
        })
        .map(|(idx, _)| idx)
        .collect();
    rebuild_with_samples(ds, &indices, "subset_samples")
}

/// Retain the taxa whose taxonomy record satisfies `pred`.
///
/// Requires a taxonomy table. Taxa without a taxonomy row cannot be
/// inspected by the predicate and are dropped. Fails with `EmptySelection`
/// when nothing survives.
pub fn subset_taxa<F>(ds: &CommunityDataSet, pred: F) -> Result<CommunityDataSet>
where
    F: Fn(&TaxonRecord<'_>) -> bool,
{
    let taxonomy = ds.taxonomy().ok_or_else(|| {
        EcoError::MalformedDataset("subset_taxa requires a taxonomy table".to_string())
    })?;

    let indices: Vec<usize> = ds
        .abundance()
        .taxon_ids()
        .iter()
        .enumerate()
        .filter(|(_, tid)| {
            taxonomy
                .record(tid)
                .map(|rec| pred(&rec))
                .unwrap_or(false)
        })
        .map(|(idx, _)| idx)
        .collect();
    rebuild_with_taxa(ds, &indices, "subset_taxa")
}
