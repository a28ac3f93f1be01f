//! Alpha diversity: within-sample richness and evenness.

use crate::data::CommunityDataSet;
use crate::error::{EcoError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A supported alpha-diversity measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlphaMeasure {
    /// Count of taxa with non-zero abundance.
    Observed,
    /// Shannon entropy `H = -Σ p_i ln(p_i)`.
    Shannon,
    /// Inverse Simpson concentration `1 / Σ p_i²`.
    InvSimpson,
}

impl AlphaMeasure {
    /// Canonical column name of the measure.
    pub fn name(&self) -> &'static str {
        match self {
            AlphaMeasure::Observed => "observed",
            AlphaMeasure::Shannon => "shannon",
            AlphaMeasure::InvSimpson => "invsimpson",
        }
    }

    /// Evaluate the measure on one abundance vector.
    ///
    /// A zero-total vector yields 0 for every measure by convention, never
    /// NaN.
    pub fn evaluate(&self, x: &[f64]) -> f64 {
        match self {
            AlphaMeasure::Observed => observed(x),
            AlphaMeasure::Shannon => shannon(x),
            AlphaMeasure::InvSimpson => inverse_simpson(x),
        }
    }
}

impl FromStr for AlphaMeasure {
    type Err = EcoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "observed" | "richness" => Ok(AlphaMeasure::Observed),
            "shannon" => Ok(AlphaMeasure::Shannon),
            "invsimpson" | "inverse_simpson" => Ok(AlphaMeasure::InvSimpson),
            _ => Err(EcoError::UnknownMeasure(s.to_string())),
        }
    }
}

/// Number of taxa present in the vector.
pub fn observed(x: &[f64]) -> f64 {
    x.iter().filter(|&&v| v > 0.0).count() as f64
}

/// Shannon index over the non-zero proportions.
pub fn shannon(x: &[f64]) -> f64 {
    let total: f64 = x.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    -x.iter()
        .filter(|&&v| v > 0.0)
        .map(|&v| {
            let p = v / total;
            p * p.ln()
        })
        .sum::<f64>()
}

/// Inverse Simpson index; 0 for an all-zero vector.
pub fn inverse_simpson(x: &[f64]) -> f64 {
    let total: f64 = x.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let concentration: f64 = x
        .iter()
        .filter(|&&v| v > 0.0)
        .map(|&v| {
            let p = v / total;
            p * p
        })
        .sum();
    1.0 / concentration
}

/// Alpha-diversity table: one row per sample, one column per measure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlphaDiversity {
    /// Sample identifiers (row names).
    pub sample_ids: Vec<String>,
    /// Measure names (column names).
    pub measures: Vec<String>,
    /// Values, indexed `[sample][measure]`.
    pub values: Vec<Vec<f64>>,
}

impl AlphaDiversity {
    /// Look up a value by sample id and measure name.
    pub fn get(&self, sample_id: &str, measure: &str) -> Option<f64> {
        let row = self.sample_ids.iter().position(|s| s == sample_id)?;
        let col = self.measures.iter().position(|m| m == measure)?;
        Some(self.values[row][col])
    }

    /// All values of one measure, in sample order.
    pub fn column(&self, measure: &str) -> Option<Vec<f64>> {
        let col = self.measures.iter().position(|m| m == measure)?;
        Some(self.values.iter().map(|row| row[col]).collect())
    }
}

/// Estimate alpha diversity for every sample.
///
/// `measures` are parsed by name; an unrecognized name fails with
/// `UnknownMeasure` before any computation happens.
pub fn estimate_richness(ds: &CommunityDataSet, measures: &[&str]) -> Result<AlphaDiversity> {
    if measures.is_empty() {
        return Err(EcoError::InvalidParameter(
            "at least one diversity measure is required".to_string(),
        ));
    }
    let parsed: Vec<AlphaMeasure> = measures
        .iter()
        .map(|m| m.parse())
        .collect::<Result<_>>()?;

    let abundance = ds.abundance();
    let values: Vec<Vec<f64>> = (0..abundance.n_samples())
        .into_par_iter()
        .map(|col| {
            let x = abundance.col_dense(col);
            parsed.iter().map(|m| m.evaluate(&x)).collect()
        })
        .collect();

    Ok(AlphaDiversity {
        sample_ids: abundance.sample_ids().to_vec(),
        measures: parsed.iter().map(|m| m.name().to_string()).collect(),
        values,
    })
}
