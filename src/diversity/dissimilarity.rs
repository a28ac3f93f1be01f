//! Pairwise dissimilarity matrices over samples or taxa.

use crate::data::CommunityDataSet;
use crate::diversity::unifrac;
use crate::error::{EcoError, Result};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which axis of the dataset the matrix is indexed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    Samples,
    Taxa,
}

/// A supported pairwise dissimilarity metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// `Σ|x_i - y_i| / Σ(x_i + y_i)`.
    BrayCurtis,
    /// Presence/absence: `1 - |A∩B| / |A∪B|`.
    Jaccard,
    /// Fraction of branch length unique to one sample's lineages.
    UnifracUnweighted,
    /// Abundance-weighted branch contribution, normalized to [0,1].
    UnifracWeighted,
}

impl FromStr for DistanceMetric {
    type Err = EcoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "bray" | "bray_curtis" | "braycurtis" => Ok(DistanceMetric::BrayCurtis),
            "jaccard" => Ok(DistanceMetric::Jaccard),
            "unifrac" | "unweighted_unifrac" => Ok(DistanceMetric::UnifracUnweighted),
            "wunifrac" | "weighted_unifrac" => Ok(DistanceMetric::UnifracWeighted),
            _ => Err(EcoError::UnknownMeasure(s.to_string())),
        }
    }
}

/// Bray-Curtis dissimilarity between two abundance vectors.
///
/// Two all-zero vectors are at distance 0 (identical empty communities).
pub fn bray_curtis(a: &[f64], b: &[f64]) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        num += (x - y).abs();
        den += x + y;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Jaccard distance between the presence sets of two abundance vectors.
pub fn jaccard(a: &[f64], b: &[f64]) -> f64 {
    let mut intersection = 0usize;
    let mut union = 0usize;
    for (&x, &y) in a.iter().zip(b) {
        let (px, py) = (x > 0.0, y > 0.0);
        if px || py {
            union += 1;
            if px && py {
                intersection += 1;
            }
        }
    }
    if union == 0 {
        0.0
    } else {
        1.0 - intersection as f64 / union as f64
    }
}

/// A symmetric, zero-diagonal dissimilarity matrix.
///
/// Stores the strict upper triangle in condensed form: entry `(i, j)` with
/// `i < j` lives at `i*n - i*(i+1)/2 + (j - i - 1)`. Symmetry and the zero
/// diagonal therefore hold by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DissimilarityMatrix {
    labels: Vec<String>,
    condensed: Vec<f64>,
}

impl DissimilarityMatrix {
    /// Create from labels and a condensed upper triangle.
    pub fn new(labels: Vec<String>, condensed: Vec<f64>) -> Result<Self> {
        let n = labels.len();
        let expected = n * n.saturating_sub(1) / 2;
        if condensed.len() != expected {
            return Err(EcoError::InvalidParameter(format!(
                "condensed matrix has {} entries, {} labels need {}",
                condensed.len(),
                n,
                expected
            )));
        }
        for &d in &condensed {
            if !d.is_finite() || d < 0.0 {
                return Err(EcoError::Numerical(format!(
                    "dissimilarity entries must be finite and non-negative, got {}",
                    d
                )));
            }
        }
        Ok(Self { labels, condensed })
    }

    /// Build by evaluating `f` once per unordered pair, in parallel.
    pub fn from_fn<F>(labels: Vec<String>, f: F) -> Result<Self>
    where
        F: Fn(usize, usize) -> f64 + Sync,
    {
        let n = labels.len();
        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .collect();
        let condensed: Vec<f64> = pairs.par_iter().map(|&(i, j)| f(i, j)).collect();
        Self::new(labels, condensed)
    }

    /// Entity labels along both axes.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Matrix dimension.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the matrix is empty.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The condensed upper triangle, row by row.
    pub fn condensed(&self) -> &[f64] {
        &self.condensed
    }

    #[inline]
    fn condensed_index(&self, i: usize, j: usize) -> usize {
        let n = self.labels.len();
        let (i, j) = if i < j { (i, j) } else { (j, i) };
        i * n - i * (i + 1) / 2 + (j - i - 1)
    }

    /// The dissimilarity between entities `i` and `j`.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i == j {
            0.0
        } else {
            self.condensed[self.condensed_index(i, j)]
        }
    }

    /// The dissimilarity between two labeled entities.
    pub fn by_label(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.labels.iter().position(|l| l == a)?;
        let j = self.labels.iter().position(|l| l == b)?;
        Some(self.get(i, j))
    }

    /// Largest entry in the matrix.
    pub fn max(&self) -> f64 {
        self.condensed.iter().copied().fold(0.0, f64::max)
    }

    /// Smallest off-diagonal entry; 0 for matrices smaller than 2×2.
    pub fn min_off_diagonal(&self) -> f64 {
        if self.condensed.is_empty() {
            0.0
        } else {
            self.condensed.iter().copied().fold(f64::INFINITY, f64::min)
        }
    }

    /// Expand to a dense symmetric matrix.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let n = self.labels.len();
        let mut dense = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in (i + 1)..n {
                let d = self.get(i, j);
                dense[(i, j)] = d;
                dense[(j, i)] = d;
            }
        }
        dense
    }
}

/// Compute the pairwise dissimilarity matrix over an axis of a dataset.
///
/// Each unordered pair is computed once (in parallel) and the diagonal is
/// zero by construction. UniFrac metrics require the phylogenetic tree
/// (`MissingTree` otherwise), full tree coverage of the taxon axis, and the
/// sample axis.
pub fn pairwise_distance(
    ds: &CommunityDataSet,
    metric: DistanceMetric,
    axis: Axis,
) -> Result<DissimilarityMatrix> {
    match metric {
        DistanceMetric::UnifracUnweighted | DistanceMetric::UnifracWeighted => {
            if axis != Axis::Samples {
                return Err(EcoError::InvalidParameter(
                    "UniFrac distances are defined over the sample axis".to_string(),
                ));
            }
            let weighted = metric == DistanceMetric::UnifracWeighted;
            unifrac::unifrac_matrix(ds, weighted)
        }
        DistanceMetric::BrayCurtis | DistanceMetric::Jaccard => {
            let abundance = ds.abundance();
            let (labels, vectors): (Vec<String>, Vec<Vec<f64>>) = match axis {
                Axis::Samples => (
                    abundance.sample_ids().to_vec(),
                    (0..abundance.n_samples())
                        .map(|col| abundance.col_dense(col))
                        .collect(),
                ),
                Axis::Taxa => (
                    abundance.taxon_ids().to_vec(),
                    (0..abundance.n_taxa())
                        .map(|row| abundance.row_dense(row))
                        .collect(),
                ),
            };
            log::debug!(
                "computing {:?} over {} entities ({} pairs)",
                metric,
                labels.len(),
                labels.len() * labels.len().saturating_sub(1) / 2
            );
            let dist = match metric {
                DistanceMetric::BrayCurtis => bray_curtis,
                _ => jaccard,
            };
            DissimilarityMatrix::from_fn(labels, |i, j| dist(&vectors[i], &vectors[j]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::tests::toy_dataset;
    use crate::data::{AbundanceTable, SampleData, Variable};
    use approx::assert_relative_eq;

    fn two_disjoint_samples() -> CommunityDataSet {
        let abundance = AbundanceTable::from_triplets(
            (2, 2),
            &[(0, 0, 10.0), (1, 1, 10.0)],
            vec!["T1".to_string(), "T2".to_string()],
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
        CommunityDataSet::new(abundance, samples, None, None).unwrap()
    }

    #[test]
    fn test_disjoint_samples_maximal_distance() {
        let ds = two_disjoint_samples();
        let bc = pairwise_distance(&ds, DistanceMetric::BrayCurtis, Axis::Samples).unwrap();
        assert_relative_eq!(bc.by_label("S1", "S2").unwrap(), 1.0);
        let jc = pairwise_distance(&ds, DistanceMetric::Jaccard, Axis::Samples).unwrap();
        assert_relative_eq!(jc.by_label("S1", "S2").unwrap(), 1.0);
    }

    #[test]
    fn test_identical_vectors_distance_zero() {
        assert_relative_eq!(bray_curtis(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
        assert_relative_eq!(jaccard(&[1.0, 2.0], &[3.0, 4.0]), 0.0);
    }

    #[test]
    fn test_all_zero_vectors() {
        assert_eq!(bray_curtis(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
        assert_eq!(jaccard(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_matrix_well_formed() {
        let ds = toy_dataset();
        let dm = pairwise_distance(&ds, DistanceMetric::BrayCurtis, Axis::Samples).unwrap();
        let n = dm.len();
        for i in 0..n {
            assert_eq!(dm.get(i, i), 0.0);
            for j in 0..n {
                assert_eq!(dm.get(i, j), dm.get(j, i));
                assert!(dm.get(i, j) >= 0.0 && dm.get(i, j) <= 1.0);
            }
        }
    }

    #[test]
    fn test_taxa_axis() {
        let ds = toy_dataset();
        let dm = pairwise_distance(&ds, DistanceMetric::Jaccard, Axis::Taxa).unwrap();
        assert_eq!(dm.labels(), ds.abundance().taxon_ids());
        // T2 only in S1, T3 only in S2: disjoint.
        assert_relative_eq!(dm.by_label("T2", "T3").unwrap(), 1.0);
    }

    #[test]
    fn test_unifrac_needs_samples_axis() {
        let ds = toy_dataset();
        assert!(pairwise_distance(&ds, DistanceMetric::UnifracWeighted, Axis::Taxa).is_err());
    }

    #[test]
    fn test_metric_parsing() {
        assert_eq!(
            "bray-curtis".parse::<DistanceMetric>().unwrap(),
            DistanceMetric::BrayCurtis
        );
        assert_eq!(
            "wunifrac".parse::<DistanceMetric>().unwrap(),
            DistanceMetric::UnifracWeighted
        );
        assert!("euclidean-ish".parse::<DistanceMetric>().is_err());
    }

    #[test]
    fn test_condensed_indexing() {
        let dm = DissimilarityMatrix::new(
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec![0.9, 0.5, 0.3],
        )
        .unwrap();
        assert_eq!(dm.get(0, 1), 0.9);
        assert_eq!(dm.get(0, 2), 0.5);
        assert_eq!(dm.get(1, 2), 0.3);
        assert_eq!(dm.get(2, 1), 0.3);
        assert_eq!(dm.max(), 0.9);
        assert_eq!(dm.min_off_diagonal(), 0.3);
    }
}
