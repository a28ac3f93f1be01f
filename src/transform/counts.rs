//! Per-sample abundance rescaling.

use crate::data::{AbundanceTable, CommunityDataSet};
use crate::error::{EcoError, Result};

/// Replace each sample's abundance vector with `f` applied to it.
///
/// `f` receives the dense abundance column of one sample and must return a
/// vector of the same length. The result is re-validated like any
/// construction, so a function emitting NaN or negative values fails with
/// `MalformedDataset`/`InvalidValue` instead of poisoning downstream math.
pub fn transform_sample_counts<F>(ds: &CommunityDataSet, f: F) -> Result<CommunityDataSet>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let abundance = ds.abundance();
    let n_taxa = abundance.n_taxa();
    let n_samples = abundance.n_samples();

    let mut triplets = Vec::new();
    for col in 0..n_samples {
        let transformed = f(&abundance.col_dense(col));
        if transformed.len() != n_taxa {
            return Err(EcoError::MalformedDataset(format!(
                "transform returned {} values for {} taxa in sample '{}'",
                transformed.len(),
                n_taxa,
                abundance.sample_ids()[col]
            )));
        }
        for (row, val) in transformed.into_iter().enumerate() {
            if val != 0.0 {
                triplets.push((row, col, val));
            }
        }
    }

    let abundance = AbundanceTable::from_triplets(
        (n_taxa, n_samples),
        &triplets,
        abundance.taxon_ids().to_vec(),
        abundance.sample_ids().to_vec(),
    )?;

    CommunityDataSet::new(
        abundance,
        ds.samples().clone(),
        ds.taxonomy().cloned(),
        ds.tree().cloned(),
    )
}

/// Convert each sample to relative abundances (columns sum to 1).
///
/// Fails with `DivisionByZero` naming the first sample whose total abundance
/// is zero; the caller must prune such samples first or accept the error.
pub fn relative_abundance(ds: &CommunityDataSet) -> Result<CommunityDataSet> {
    let sums = ds.abundance().sample_sums();
    for (col, &sum) in sums.iter().enumerate() {
        if sum == 0.0 {
            return Err(EcoError::DivisionByZero {
                sample_id: ds.abundance().sample_ids()[col].clone(),
            });
        }
    }
    // Column sums are strictly positive here, so the division is safe.
    transform_sample_counts(ds, |column| {
        let total: f64 = column.iter().sum();
        column.iter().map(|v| v / total).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::tests::toy_dataset;
    use approx::assert_relative_eq;

    #[test]
    fn test_relative_abundance() {
        let ds = toy_dataset();
        let rel = relative_abundance(&ds).unwrap();
        for sums in rel.abundance().sample_sums() {
            assert_relative_eq!(sums, 1.0);
        }
        assert_relative_eq!(rel.abundance().get(0, 0), 0.4);
        assert_relative_eq!(rel.abundance().get(2, 1), 0.9);
    }

    #[test]
    fn test_zero_sum_sample_surfaces() {
        let ds = toy_dataset();
        // Zero out all of S2.
        let zeroed = transform_sample_counts(&ds, |column| {
            if column == [1.0, 0.0, 9.0] {
                vec![0.0; column.len()]
            } else {
                column.to_vec()
            }
        })
        .unwrap();
        let res = relative_abundance(&zeroed);
        assert!(
            matches!(res, Err(EcoError::DivisionByZero { ref sample_id }) if sample_id == "S2")
        );
    }

    #[test]
    fn test_transform_rejects_wrong_length() {
        let ds = toy_dataset();
        assert!(transform_sample_counts(&ds, |_| vec![1.0]).is_err());
    }

    #[test]
    fn test_transform_rejects_negative_output() {
        let ds = toy_dataset();
        let res = transform_sample_counts(&ds, |column| column.iter().map(|v| v - 5.0).collect());
        assert!(res.is_err());
    }

    #[test]
    fn test_log_style_transform() {
        let ds = toy_dataset();
        let logged =
            transform_sample_counts(&ds, |column| column.iter().map(|v| (v + 1.0).ln()).collect())
                .unwrap();
        assert_relative_eq!(logged.abundance().get(0, 0), (5.0f64).ln());
    }
}
