//! Sparse abundance table for community-sequencing data.

use crate::error::{EcoError, Result};
use rayon::prelude::*;
use sprs::{CsMat, TriMat};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A sparse abundance table storing per-taxon abundances across samples.
///
/// Rows represent taxa (OTUs/ASVs), columns represent samples. Entries are
/// non-negative finite `f64` so the same type holds raw counts and
/// transformed abundances (e.g. proportions). Uses CSR format for efficient
/// row-wise operations.
#[derive(Debug, Clone)]
pub struct AbundanceTable {
    /// Sparse matrix in CSR format (taxa × samples).
    data: CsMat<f64>,
    /// Taxon identifiers (row names).
    taxon_ids: Vec<String>,
    /// Sample identifiers (column names).
    sample_ids: Vec<String>,
}

impl AbundanceTable {
    /// Create a new table from a sparse matrix and identifiers.
    ///
    /// Validates dimensions, identifier uniqueness, and that every stored
    /// entry is finite and non-negative.
    pub fn new(data: CsMat<f64>, taxon_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != taxon_ids.len() {
            return Err(EcoError::MalformedDataset(format!(
                "abundance has {} rows but {} taxon ids",
                nrows,
                taxon_ids.len()
            )));
        }
        if ncols != sample_ids.len() {
            return Err(EcoError::MalformedDataset(format!(
                "abundance has {} columns but {} sample ids",
                ncols,
                sample_ids.len()
            )));
        }
        check_unique(&taxon_ids, "taxon")?;
        check_unique(&sample_ids, "sample")?;

        for (row, row_vec) in data.outer_iterator().enumerate() {
            for (col, &val) in row_vec.iter() {
                if !val.is_finite() || val < 0.0 {
                    return Err(EcoError::InvalidValue {
                        value: val.to_string(),
                        row,
                        col,
                    });
                }
            }
        }

        Ok(Self {
            data,
            taxon_ids,
            sample_ids,
        })
    }

    /// Build a table from (taxon index, sample index, value) triplets.
    ///
    /// Zero values are not stored. Duplicate triplets at the same position
    /// are summed, matching sparse-matrix construction semantics.
    pub fn from_triplets(
        shape: (usize, usize),
        triplets: &[(usize, usize, f64)],
        taxon_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let mut tri = TriMat::new(shape);
        for &(row, col, val) in triplets {
            if val != 0.0 {
                tri.add_triplet(row, col, val);
            }
        }
        Self::new(tri.to_csr(), taxon_ids, sample_ids)
    }

    /// Load an abundance table from a TSV file.
    ///
    /// First row: header with sample IDs (first cell is the taxon-id column
    /// header). Subsequent rows: taxon ID followed by abundances.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| EcoError::MalformedDataset("empty abundance TSV".to_string()))??;
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(EcoError::MalformedDataset(
                "abundance TSV must have at least one sample column".to_string(),
            ));
        }
        let sample_ids: Vec<String> = header[1..].iter().map(|s| s.to_string()).collect();
        let n_samples = sample_ids.len();

        let mut triplets: Vec<(usize, usize, f64)> = Vec::new();
        let mut taxon_ids: Vec<String> = Vec::new();

        for line_result in lines {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let row_idx = taxon_ids.len();
            taxon_ids.push(fields[0].to_string());

            for (col_idx, value_str) in fields[1..].iter().enumerate() {
                if col_idx >= n_samples {
                    break;
                }
                let value: f64 =
                    value_str
                        .trim()
                        .parse()
                        .map_err(|_| EcoError::InvalidValue {
                            value: value_str.to_string(),
                            row: row_idx,
                            col: col_idx,
                        })?;
                if value != 0.0 {
                    triplets.push((row_idx, col_idx, value));
                }
            }
        }

        if taxon_ids.is_empty() {
            return Err(EcoError::MalformedDataset(
                "no taxa in abundance TSV".to_string(),
            ));
        }

        let n_taxa = taxon_ids.len();
        Self::from_triplets((n_taxa, n_samples), &triplets, taxon_ids, sample_ids)
    }

    /// Write the table to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "taxon_id")?;
        for sample_id in &self.sample_ids {
            write!(writer, "\t{}", sample_id)?;
        }
        writeln!(writer)?;

        for (row_idx, taxon_id) in self.taxon_ids.iter().enumerate() {
            write!(writer, "{}", taxon_id)?;
            for col_idx in 0..self.n_samples() {
                write!(writer, "\t{}", self.get(row_idx, col_idx))?;
            }
            writeln!(writer)?;
        }

        Ok(())
    }

    /// Get the value at (row, col), returning 0 for unstored entries.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data.get(row, col).copied().unwrap_or(0.0)
    }

    /// Number of taxa (rows).
    #[inline]
    pub fn n_taxa(&self) -> usize {
        self.data.rows()
    }

    /// Number of samples (columns).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.cols()
    }

    /// Total number of stored non-zero entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.data.nnz()
    }

    /// Taxon identifiers.
    #[inline]
    pub fn taxon_ids(&self) -> &[String] {
        &self.taxon_ids
    }

    /// Sample identifiers.
    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Row index of a taxon id, if present.
    pub fn taxon_index(&self, taxon_id: &str) -> Option<usize> {
        self.taxon_ids.iter().position(|t| t == taxon_id)
    }

    /// Column index of a sample id, if present.
    pub fn sample_index(&self, sample_id: &str) -> Option<usize> {
        self.sample_ids.iter().position(|s| s == sample_id)
    }

    /// Get a dense vector for a specific row (taxon).
    pub fn row_dense(&self, row: usize) -> Vec<f64> {
        let mut dense = vec![0.0; self.n_samples()];
        if let Some(row_vec) = self.data.outer_view(row) {
            for (col, &val) in row_vec.iter() {
                dense[col] = val;
            }
        }
        dense
    }

    /// Get a dense vector for a specific column (sample).
    pub fn col_dense(&self, col: usize) -> Vec<f64> {
        (0..self.n_taxa()).map(|row| self.get(row, col)).collect()
    }

    /// Compute row sums (total abundance per taxon).
    pub fn taxon_sums(&self) -> Vec<f64> {
        (0..self.n_taxa())
            .into_par_iter()
            .map(|row| {
                self.data
                    .outer_view(row)
                    .map(|v| v.iter().map(|(_, &val)| val).sum())
                    .unwrap_or(0.0)
            })
            .collect()
    }

    /// Compute column sums (total abundance per sample).
    pub fn sample_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_samples()];
        for row_vec in self.data.outer_iterator() {
            for (col, &val) in row_vec.iter() {
                sums[col] += val;
            }
        }
        sums
    }

    /// All stored non-zero triplets (row, col, value).
    pub fn triplets(&self) -> Vec<(usize, usize, f64)> {
        let mut out = Vec::with_capacity(self.nnz());
        for (row, row_vec) in self.data.outer_iterator().enumerate() {
            for (col, &val) in row_vec.iter() {
                out.push((row, col, val));
            }
        }
        out
    }

    /// Subset the table to the specified taxa (by index), in the given order.
    pub fn subset_taxa(&self, indices: &[usize]) -> Result<Self> {
        let n_taxa = indices.len();
        let n_samples = self.n_samples();

        let mut triplets = Vec::new();
        let mut new_taxon_ids = Vec::with_capacity(n_taxa);

        for (new_row, &old_row) in indices.iter().enumerate() {
            if old_row >= self.n_taxa() {
                return Err(EcoError::InvalidParameter(format!(
                    "taxon index {} out of bounds",
                    old_row
                )));
            }
            new_taxon_ids.push(self.taxon_ids[old_row].clone());

            if let Some(row_vec) = self.data.outer_view(old_row) {
                for (col, &val) in row_vec.iter() {
                    triplets.push((new_row, col, val));
                }
            }
        }

        Self::from_triplets(
            (n_taxa, n_samples),
            &triplets,
            new_taxon_ids,
            self.sample_ids.clone(),
        )
    }

    /// Subset the table to the specified samples (by index), in the given order.
    pub fn subset_samples(&self, indices: &[usize]) -> Result<Self> {
        let n_taxa = self.n_taxa();
        let n_samples = indices.len();

        let mut new_sample_ids = Vec::with_capacity(n_samples);
        for &old_col in indices {
            if old_col >= self.n_samples() {
                return Err(EcoError::InvalidParameter(format!(
                    "sample index {} out of bounds",
                    old_col
                )));
            }
            new_sample_ids.push(self.sample_ids[old_col].clone());
        }

        let col_map: HashMap<usize, usize> = indices
            .iter()
            .enumerate()
            .map(|(new_idx, &old_idx)| (old_idx, new_idx))
            .collect();

        let mut triplets = Vec::new();
        for (row, row_vec) in self.data.outer_iterator().enumerate() {
            for (old_col, &val) in row_vec.iter() {
                if let Some(&new_col) = col_map.get(&old_col) {
                    triplets.push((row, new_col, val));
                }
            }
        }

        Self::from_triplets(
            (n_taxa, n_samples),
            &triplets,
            self.taxon_ids.clone(),
            new_sample_ids,
        )
    }

    /// Convert to a dense matrix (taxa × samples).
    pub fn to_dense(&self) -> nalgebra::DMatrix<f64> {
        let mut dense = nalgebra::DMatrix::zeros(self.n_taxa(), self.n_samples());
        for (row, row_vec) in self.data.outer_iterator().enumerate() {
            for (col, &val) in row_vec.iter() {
                dense[(row, col)] = val;
            }
        }
        dense
    }

    /// Create from a dense matrix (taxa × samples).
    pub fn from_dense(
        data: &nalgebra::DMatrix<f64>,
        taxon_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        let mut triplets = Vec::new();
        for row in 0..nrows {
            for col in 0..ncols {
                let val = data[(row, col)];
                if val != 0.0 {
                    triplets.push((row, col, val));
                }
            }
        }
        Self::from_triplets((nrows, ncols), &triplets, taxon_ids, sample_ids)
    }
}

fn check_unique(ids: &[String], axis: &str) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(EcoError::MalformedDataset(format!(
                "duplicate {} id '{}'",
                axis, id
            )));
        }
    }
    Ok(())
}
