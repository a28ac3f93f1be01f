//! UniFrac: phylogenetically-aware dissimilarity between samples.
//!
//! Both variants reduce to one post-order pass over the tree arena that
//! accumulates, per branch, the abundance mass each sample places in the
//! subtree below it. Pairwise distances are then sums over branches, run in
//! parallel across sample pairs.

use crate::data::CommunityDataSet;
use crate::diversity::dissimilarity::DissimilarityMatrix;
use crate::error::{EcoError, Result};
use rayon::prelude::*;

/// Per-branch subtree masses for every sample.
struct BranchMasses {
    /// Branch lengths, one per retained branch.
    lengths: Vec<f64>,
    /// `masses[branch][sample]` = abundance mass below the branch.
    masses: Vec<Vec<f64>>,
    /// Total abundance per sample.
    totals: Vec<f64>,
}

fn accumulate_masses(ds: &CommunityDataSet) -> Result<BranchMasses> {
    let tree = ds.require_covering_tree("unifrac")?;
    let abundance = ds.abundance();
    let n_samples = abundance.n_samples();
    let n_nodes = tree.nodes().len();

    // Subtree mass per node and sample, children before parents.
    let mut node_masses = vec![vec![0.0; n_samples]; n_nodes];
    for node_idx in tree.postorder() {
        let node = &tree.nodes()[node_idx];
        if node.is_tip() {
            let label = node.label.as_deref().unwrap_or("");
            let row = abundance.taxon_index(label).ok_or_else(|| {
                EcoError::MalformedDataset(format!(
                    "tree tip '{}' is not on the abundance taxon axis",
                    label
                ))
            })?;
            node_masses[node_idx] = abundance.row_dense(row);
        } else {
            let mut sum = vec![0.0; n_samples];
            for &child in &node.children {
                for (s, &m) in node_masses[child].iter().enumerate() {
                    sum[s] += m;
                }
            }
            node_masses[node_idx] = sum;
        }
    }

    let totals = abundance.sample_sums();

    // Every non-root node contributes its edge to the parent.
    let mut lengths = Vec::with_capacity(n_nodes - 1);
    let mut masses = Vec::with_capacity(n_nodes - 1);
    for (idx, node) in tree.nodes().iter().enumerate() {
        if node.parent.is_some() {
            lengths.push(node.branch_length);
            masses.push(std::mem::take(&mut node_masses[idx]));
        }
    }

    Ok(BranchMasses {
        lengths,
        masses,
        totals,
    })
}

fn unweighted_pair(bm: &BranchMasses, a: usize, b: usize) -> f64 {
    let mut unique = 0.0;
    let mut covered = 0.0;
    for (branch, &len) in bm.lengths.iter().enumerate() {
        let pa = bm.masses[branch][a] > 0.0;
        let pb = bm.masses[branch][b] > 0.0;
        if pa || pb {
            covered += len;
            if pa != pb {
                unique += len;
            }
        }
    }
    if covered == 0.0 {
        0.0
    } else {
        unique / covered
    }
}

fn weighted_pair(bm: &BranchMasses, a: usize, b: usize) -> f64 {
    let (ta, tb) = (bm.totals[a], bm.totals[b]);
    let mut diff = 0.0;
    let mut scale = 0.0;
    for (branch, &len) in bm.lengths.iter().enumerate() {
        let pa = if ta > 0.0 { bm.masses[branch][a] / ta } else { 0.0 };
        let pb = if tb > 0.0 { bm.masses[branch][b] / tb } else { 0.0 };
        diff += len * (pa - pb).abs();
        scale += len * (pa + pb);
    }
    if scale == 0.0 {
        0.0
    } else {
        diff / scale
    }
}

/// Compute the full UniFrac matrix over the sample axis.
pub(crate) fn unifrac_matrix(
    ds: &CommunityDataSet,
    weighted: bool,
) -> Result<DissimilarityMatrix> {
    let bm = accumulate_masses(ds)?;
    let labels = ds.abundance().sample_ids().to_vec();
    log::debug!(
        "computing {} UniFrac over {} samples and {} branches",
        if weighted { "weighted" } else { "unweighted" },
        labels.len(),
        bm.lengths.len()
    );

    let n = labels.len();
    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .collect();
    let condensed: Vec<f64> = pairs
        .par_iter()
        .map(|&(i, j)| {
            if weighted {
                weighted_pair(&bm, i, j)
            } else {
                unweighted_pair(&bm, i, j)
            }
        })
        .collect();
    DissimilarityMatrix::new(labels, condensed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AbundanceTable, CommunityDataSet, PhyloTree, SampleData, Variable};
    use crate::diversity::{pairwise_distance, Axis, DistanceMetric};
    use approx::assert_relative_eq;

    /// Two samples occupying disjoint halves of a symmetric tree.
    fn disjoint_dataset() -> CommunityDataSet {
        let tree = PhyloTree::from_newick("((T1:1,T2:1):1,(T3:1,T4:1):1);").unwrap();
        let abundance = AbundanceTable::from_triplets(
            (4, 2),
            &[(0, 0, 5.0), (1, 0, 5.0), (2, 1, 5.0), (3, 1, 5.0)],
            vec![
                "T1".to_string(),
                "T2".to_string(),
                "T3".to_string(),
                "T4".to_string(),
            ],
            vec!["S1".to_string(), "S2".to_string()],
        )
        .unwrap();
        let samples = SampleData::from_columns(
            vec!["S1".to_string(), "S2".to_string()],
            vec![(
                "x".to_string(),
                vec![Variable::Continuous(0.0), Variable::Continuous(1.0)],
            )],
        )
        .unwrap();
        CommunityDataSet::new(abundance, samples, None, Some(tree)).unwrap()
    }

    #[test]
    fn test_disjoint_lineages_distance_one() {
        let ds = disjoint_dataset();
        let un = pairwise_distance(&ds, DistanceMetric::UnifracUnweighted, Axis::Samples).unwrap();
        assert_relative_eq!(un.by_label("S1", "S2").unwrap(), 1.0);
        let wt = pairwise_distance(&ds, DistanceMetric::UnifracWeighted, Axis::Samples).unwrap();
        assert_relative_eq!(wt.by_label("S1", "S2").unwrap(), 1.0);
    }

    #[test]
    fn test_identical_samples_distance_zero() {
        let tree = PhyloTree::from_newick("((T1:1,T2:1):1,T3:2);").unwrap();
        let abundance = AbundanceTable::from_triplets(
            (3, 2),
            &[
                (0, 0, 3.0),
                (1, 0, 2.0),
                (2, 0, 1.0),
                (0, 1, 3.0),
                (1, 1, 2.0),
                (2, 1, 1.0),
            ],
            vec!["T1".to_string(), "T2".to_string(), "T3".to_string()],
            vec!["S1".to_string(), "S2".to_string()],
        )
        .unwrap();
        let samples = SampleData::from_columns(
            vec!["S1".to_string(), "S2".to_string()],
            vec![],
        )
        .unwrap();
        let ds = CommunityDataSet::new(abundance, samples, None, Some(tree)).unwrap();

        let un = unifrac_matrix(&ds, false).unwrap();
        assert_relative_eq!(un.get(0, 1), 0.0);
        let wt = unifrac_matrix(&ds, true).unwrap();
        assert_relative_eq!(wt.get(0, 1), 0.0);
    }

    #[test]
    fn test_partial_overlap_between_bounds() {
        let tree = PhyloTree::from_newick("((T1:1,T2:1):1,T3:2);").unwrap();
        let abundance = AbundanceTable::from_triplets(
            (3, 2),
            &[(0, 0, 5.0), (1, 0, 5.0), (1, 1, 5.0), (2, 1, 5.0)],
            vec!["T1".to_string(), "T2".to_string(), "T3".to_string()],
            vec!["S1".to_string(), "S2".to_string()],
        )
        .unwrap();
        let samples = SampleData::from_columns(
            vec!["S1".to_string(), "S2".to_string()],
            vec![],
        )
        .unwrap();
        let ds = CommunityDataSet::new(abundance, samples, None, Some(tree)).unwrap();

        let d = unifrac_matrix(&ds, false).unwrap().get(0, 1);
        assert!(d > 0.0 && d < 1.0);
        let w = unifrac_matrix(&ds, true).unwrap().get(0, 1);
        assert!(w > 0.0 && w < 1.0);
    }

    #[test]
    fn test_missing_tree() {
        let ds = disjoint_dataset();
        let bare = CommunityDataSet::new(
            ds.abundance().clone(),
            ds.samples().clone(),
            None,
            None,
        )
        .unwrap();
        assert!(matches!(
            unifrac_matrix(&bare, true),
            Err(crate::error::EcoError::MissingTree(_))
        ));
    }

    #[test]
    fn test_incomplete_coverage_rejected() {
        // Tree only covers T1 and T2, abundance has T3 as well.
        let tree = PhyloTree::from_newick("(T1:1,T2:1);").unwrap();
        let abundance = AbundanceTable::from_triplets(
            (3, 2),
            &[(0, 0, 1.0), (1, 1, 1.0), (2, 1, 1.0)],
            vec!["T1".to_string(), "T2".to_string(), "T3".to_string()],
            vec!["S1".to_string(), "S2".to_string()],
        )
        .unwrap();
        let samples = SampleData::from_columns(
            vec!["S1".to_string(), "S2".to_string()],
            vec![],
        )
        .unwrap();
        let ds = CommunityDataSet::new(abundance, samples, None, Some(tree)).unwrap();
        assert!(matches!(
            unifrac_matrix(&ds, false),
            Err(crate::error::EcoError::MalformedDataset(_))
        ));
    }
}
