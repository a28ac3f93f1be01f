//! Abundance-vector scoring filter over taxa.

use super::rebuild_with_taxa;
use crate::data::CommunityDataSet;
use crate::error::Result;
use rayon::prelude::*;

/// Filter taxa by a score over their full abundance vector across samples.
///
/// `score` sees each taxon's dense abundance row. When `keep` is true, taxa
/// scoring true are retained; when false, taxa scoring false are retained.
/// Typical use: "observed more than 3 times in at least 20% of samples".
///
/// Fails with `EmptySelection` when nothing survives.
pub fn filter_taxa<F>(ds: &CommunityDataSet, score: F, keep: bool) -> Result<CommunityDataSet>
where
    F: Fn(&[f64]) -> bool + Sync,
{
    let abundance = ds.abundance();
    let indices: Vec<usize> = (0..abundance.n_taxa())
        .into_par_iter()
        .filter(|&row| score(&abundance.row_dense(row)) == keep)
        .collect();
    // par_iter preserves index order on collect, so the taxon order is stable.
    rebuild_with_taxa(ds, &indices, "filter_taxa")
}
