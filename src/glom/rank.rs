//! Agglomeration of taxa by shared taxonomic rank.

use super::{rebuild_collapsed, sum_taxon_groups};
use crate::data::CommunityDataSet;
use crate::error::Result;
use std::collections::HashMap;

/// Collapse taxa sharing identical assignments at `rank` and all coarser
/// ranks.
///
/// Abundances sum per group; the representative is the first member in
/// taxon-axis order. Ranks finer than `rank` are no longer meaningful after
/// aggregation and are set to unassigned in the result. Unassigned is
/// treated as a value of its own, so taxa lacking an assignment at `rank`
/// group together rather than being dropped.
///
/// Fails with `UnknownRank` for an unrecognized rank name and with
/// `MalformedDataset` when the taxonomy does not cover every taxon.
pub fn tax_glom(ds: &CommunityDataSet, rank: &str) -> Result<CommunityDataSet> {
    let taxonomy = ds.require_covering_taxonomy("tax_glom")?;
    let rank_idx = taxonomy.rank_index(rank)?;

    // Group key = assignments from the coarsest rank down to `rank`.
    let taxon_ids = ds.abundance().taxon_ids();
    let mut key_group: HashMap<Vec<Option<String>>, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (row, taxon_id) in taxon_ids.iter().enumerate() {
        let assignments = taxonomy.assignments(taxon_id).ok_or_else(|| {
            crate::error::EcoError::MalformedDataset(format!(
                "taxon '{}' lost its taxonomy row during tax_glom",
                taxon_id
            ))
        })?;
        let key: Vec<Option<String>> = assignments[..=rank_idx].to_vec();
        match key_group.get(&key) {
            Some(&group_idx) => groups[group_idx].1.push(row),
            None => {
                key_group.insert(key, groups.len());
                groups.push((taxon_id.clone(), vec![row]));
            }
        }
    }

    let abundance = sum_taxon_groups(ds.abundance(), &groups)?;
    let collapsed = rebuild_collapsed(ds, abundance, "tax_glom")?;

    // Blank the finer ranks on the surviving representatives.
    let mut taxonomy = collapsed.taxonomy().cloned().ok_or_else(|| {
        crate::error::EcoError::MalformedDataset(
            "taxonomy missing after tax_glom collapse".to_string(),
        )
    })?;
    for taxon_id in taxonomy.taxon_ids().to_vec() {
        let mut row = match taxonomy.assignments(&taxon_id) {
            Some(row) => row.to_vec(),
            None => continue,
        };
        for slot in row.iter_mut().skip(rank_idx + 1) {
            *slot = None;
        }
        taxonomy = taxonomy.with_assignments(&taxon_id, row)?;
    }

    CommunityDataSet::new(
        collapsed.abundance().clone(),
        collapsed.samples().clone(),
        Some(taxonomy),
        collapsed.tree().cloned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AbundanceTable, SampleData, TaxonomyTable, Variable};
    use crate::error::EcoError;

    fn ranked_dataset() -> CommunityDataSet {
        let abundance = AbundanceTable::from_triplets(
            (4, 1),
            &[(0, 0, 1.0), (1, 0, 2.0), (2, 0, 4.0), (3, 0, 8.0)],
            vec![
                "T1".to_string(),
                "T2".to_string(),
                "T3".to_string(),
                "T4".to_string(),
            ],
            vec!["S1".to_string()],
        )
        .unwrap();
        let samples = SampleData::from_columns(vec!["S1".to_string()], vec![]).unwrap();
        let taxonomy = TaxonomyTable::new(
            vec![
                "Phylum".to_string(),
                "Genus".to_string(),
                "Species".to_string(),
            ],
            vec![
                "T1".to_string(),
                "T2".to_string(),
                "T3".to_string(),
                "T4".to_string(),
            ],
            vec![
                vec![
                    Some("Firmicutes".to_string()),
                    Some("Bacillus".to_string()),
                    Some("subtilis".to_string()),
                ],
                vec![
                    Some("Firmicutes".to_string()),
                    Some("Bacillus".to_string()),
                    Some("cereus".to_string()),
                ],
                vec![
                    Some("Firmicutes".to_string()),
                    Some("Lactobacillus".to_string()),
                    None,
                ],
                vec![
                    Some("Proteobacteria".to_string()),
                    Some("Vibrio".to_string()),
                    Some("cholerae".to_string()),
                ],
            ],
        )
        .unwrap();
        CommunityDataSet::new(abundance, samples, Some(taxonomy), None).unwrap()
    }

    #[test]
    fn test_glom_at_genus() {
        let ds = ranked_dataset();
        let merged = tax_glom(&ds, "Genus").unwrap();

        // T1+T2 (Firmicutes/Bacillus); T3; T4.
        assert_eq!(merged.abundance().taxon_ids(), &["T1", "T3", "T4"]);
        assert_eq!(merged.taxon_sum("T1").unwrap(), 3.0);

        // Species is finer than Genus, so it is blanked.
        let tax = merged.taxonomy().unwrap();
        assert_eq!(tax.record("T1").unwrap().assignment("Species"), None);
        assert_eq!(tax.record("T1").unwrap().assignment("Genus"), Some("Bacillus"));
    }

    #[test]
    fn test_glom_at_phylum() {
        let ds = ranked_dataset();
        let merged = tax_glom(&ds, "Phylum").unwrap();
        assert_eq!(merged.abundance().taxon_ids(), &["T1", "T4"]);
        assert_eq!(merged.taxon_sum("T1").unwrap(), 7.0);
        let tax = merged.taxonomy().unwrap();
        assert_eq!(tax.record("T1").unwrap().assignment("Genus"), None);
    }

    #[test]
    fn test_unknown_rank() {
        let ds = ranked_dataset();
        assert!(matches!(
            tax_glom(&ds, "Kingdom"),
            Err(EcoError::UnknownRank(_))
        ));
    }

    #[test]
    fn test_incomplete_coverage_rejected() {
        let ds = ranked_dataset();
        let partial = ds.taxonomy().unwrap().restrict_to(
            &["T1", "T2", "T3"].into_iter().collect(),
        );
        let ds2 = CommunityDataSet::new(
            ds.abundance().clone(),
            ds.samples().clone(),
            Some(partial),
            None,
        )
        .unwrap();
        assert!(matches!(
            tax_glom(&ds2, "Genus"),
            Err(EcoError::MalformedDataset(_))
        ));
    }

    #[test]
    fn test_sum_conservation() {
        let ds = ranked_dataset();
        let before: f64 = ds.abundance().sample_sums().iter().sum();
        let merged = tax_glom(&ds, "Phylum").unwrap();
        let after: f64 = merged.abundance().sample_sums().iter().sum();
        assert_eq!(before, after);
    }
}
