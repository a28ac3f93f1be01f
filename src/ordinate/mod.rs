//! Ordination: embed a dissimilarity matrix into a low-dimensional space.
//!
//! Non-metric multidimensional scaling (NMDS) is the primary method; principal
//! coordinates analysis (PCoA) is the metric fallback. Both consume a
//! [`DissimilarityMatrix`] so any distance metric can feed either method.

pub mod nmds;
pub mod pcoa;

use crate::diversity::DissimilarityMatrix;
use crate::error::{EcoError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub use nmds::{nmds, nmds_with_cancel, NmdsConfig};
pub use pcoa::pcoa;

/// Available ordination methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrdinationMethod {
    Nmds,
    Pcoa,
}

impl OrdinationMethod {
    pub fn name(&self) -> &'static str {
        match self {
            OrdinationMethod::Nmds => "NMDS",
            OrdinationMethod::Pcoa => "PCoA",
        }
    }
}

impl FromStr for OrdinationMethod {
    type Err = EcoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "nmds" => Ok(OrdinationMethod::Nmds),
            "pcoa" | "mds" => Ok(OrdinationMethod::Pcoa),
            other => Err(EcoError::UnknownMeasure(other.to_string())),
        }
    }
}

/// Result of an ordination run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdinationResult {
    /// Method that produced the embedding.
    pub method: String,
    /// Point labels, in the order of the input matrix.
    pub labels: Vec<String>,
    /// One coordinate row per point, each of length `axes`.
    pub coordinates: Vec<Vec<f64>>,
    /// Number of embedding axes.
    pub axes: usize,
    /// Final stress (Kruskal stress-1 for NMDS, 0.0 for PCoA).
    pub stress: f64,
    /// Whether the optimizer reached its convergence criterion.
    pub converged: bool,
}

impl OrdinationResult {
    /// Coordinates of a labelled point, if present.
    pub fn point(&self, label: &str) -> Option<&[f64]> {
        let idx = self.labels.iter().position(|l| l == label)?;
        Some(&self.coordinates[idx])
    }
}

/// Run the requested ordination on a dissimilarity matrix.
///
/// # Arguments
/// * `dm` - Pairwise dissimilarities between the points to embed
/// * `method` - NMDS or PCoA
/// * `k` - Number of embedding axes
/// * `config` - NMDS optimizer settings (ignored by PCoA)
pub fn ordinate(
    dm: &DissimilarityMatrix,
    method: OrdinationMethod,
    k: usize,
    config: &NmdsConfig,
) -> Result<OrdinationResult> {
    match method {
        OrdinationMethod::Nmds => nmds(dm, k, config),
        OrdinationMethod::Pcoa => pcoa(dm, k),
    }
}
