//! Identifier-predicate pruning of samples and taxa.

use super::{rebuild_with_samples, rebuild_with_taxa};
use crate::data::CommunityDataSet;
use crate::error::Result;

/// Retain the samples whose id satisfies `keep`.
///
/// The predicate sees only the sample id; callers wanting abundance-derived
/// criteria (e.g. minimum total reads) precompute the qualifying set and
/// close over it. Fails with `EmptySelection` when nothing survives.
pub fn prune_samples<F>(ds: &CommunityDataSet, keep: F) -> Result<CommunityDataSet>
where
    F: Fn(&str) -> bool,
{
    let indices: Vec<usize> = ds
        .abundance()
        .sample_ids()
        .iter()
        .enumerate()
        .filter(|(_, sid)| keep(sid))
        .map(|(idx, _)| idx)
        .collect();
    rebuild_with_samples(ds, &indices, "prune_samples")
}

/// Retain the taxa whose id satisfies `keep`.
///
/// The taxonomy is restricted and the tree pruned to the survivors. Fails
/// with `EmptySelection` when nothing survives.
pub fn prune_taxa<F>(ds: &CommunityDataSet, keep: F) -> Result<CommunityDataSet>
where
    F: Fn(&str) -> bool,
{
    let indices: Vec<usize> = ds
        .abundance()
        .taxon_ids()
        .iter()
        .enumerate()
        .filter(|(_, tid)| keep(tid))
        .map(|(idx, _)| idx)
        .collect();
    rebuild_with_taxa(ds, &indices, "prune_taxa")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::tests::toy_dataset;
    use crate::error::EcoError;

    #[test]
    fn test_prune_samples() {
        let ds = toy_dataset();
        let pruned = prune_samples(&ds, |sid| sid == "S1").unwrap();
        assert_eq!(pruned.sample_count(), 1);
        assert_eq!(pruned.abundance().sample_ids(), &["S1"]);
        // Untouched tables carry over.
        assert!(pruned.taxonomy().is_some());
        assert!(pruned.tree().is_some());
    }

    #[test]
    fn test_prune_samples_monotonic() {
        let ds = toy_dataset();
        let all = prune_samples(&ds, |_| true).unwrap();
        assert_eq!(all.sample_count(), ds.sample_count());
    }

    #[test]
    fn test_prune_samples_empty() {
        let ds = toy_dataset();
        assert!(matches!(
            prune_samples(&ds, |_| false),
            Err(EcoError::EmptySelection(_))
        ));
    }

    #[test]
    fn test_prune_taxa_restricts_linked_tables() {
        let ds = toy_dataset();
        let pruned = prune_taxa(&ds, |tid| tid != "T2").unwrap();
        assert_eq!(pruned.taxon_count(), 2);
        assert_eq!(pruned.taxonomy().unwrap().taxon_ids(), &["T1", "T3"]);
        assert_eq!(pruned.tree().unwrap().n_tips(), 2);
        assert!(!pruned.tree().unwrap().has_tip("T2"));
    }

    #[test]
    fn test_prune_taxa_by_total_abundance() {
        let ds = toy_dataset();
        // Precomputed qualifying set, as callers are expected to do.
        let sums = ds.abundance().taxon_sums();
        let ids = ds.abundance().taxon_ids();
        let qualifying: std::collections::HashSet<&str> = ids
            .iter()
            .zip(&sums)
            .filter(|(_, &s)| s >= 5.0)
            .map(|(id, _)| id.as_str())
            .collect();
        let pruned = prune_taxa(&ds, |tid| qualifying.contains(tid)).unwrap();
        assert_eq!(pruned.taxon_count(), 3);
    }
}
