//! Taxonomic assignment table (taxa × ranks).

use crate::error::{EcoError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// One taxon's rank assignments, as seen by subset predicates.
#[derive(Debug, Clone, Copy)]
pub struct TaxonRecord<'a> {
    taxon_id: &'a str,
    ranks: &'a [String],
    assignments: &'a [Option<String>],
}

impl<'a> TaxonRecord<'a> {
    /// The taxon this record belongs to.
    pub fn taxon_id(&self) -> &'a str {
        self.taxon_id
    }

    /// The assignment at a named rank; `None` if the rank is unknown or the
    /// assignment is missing.
    pub fn assignment(&self, rank: &str) -> Option<&'a str> {
        let idx = self.ranks.iter().position(|r| r == rank)?;
        self.assignments[idx].as_deref()
    }

    /// All assignments in rank order.
    pub fn assignments(&self) -> &'a [Option<String>] {
        self.assignments
    }
}

/// Taxonomic assignments: an ordered rank hierarchy (coarse to fine) with one
/// row of `Option<String>` assignments per taxon. `None` means unassigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyTable {
    /// Rank names, coarsest first (e.g. Kingdom..Species).
    ranks: Vec<String>,
    /// Taxon identifiers (row names).
    taxon_ids: Vec<String>,
    /// Per-taxon assignments, one entry per rank.
    assignments: Vec<Vec<Option<String>>>,
}

impl TaxonomyTable {
    /// Create a new taxonomy table.
    pub fn new(
        ranks: Vec<String>,
        taxon_ids: Vec<String>,
        assignments: Vec<Vec<Option<String>>>,
    ) -> Result<Self> {
        if taxon_ids.len() != assignments.len() {
            return Err(EcoError::MalformedDataset(format!(
                "taxonomy has {} taxa but {} assignment rows",
                taxon_ids.len(),
                assignments.len()
            )));
        }
        for (taxon_id, row) in taxon_ids.iter().zip(&assignments) {
            if row.len() != ranks.len() {
                return Err(EcoError::MalformedDataset(format!(
                    "taxon '{}' has {} assignments for {} ranks",
                    taxon_id,
                    row.len(),
                    ranks.len()
                )));
            }
        }
        let unique: HashSet<&str> = taxon_ids.iter().map(|s| s.as_str()).collect();
        if unique.len() != taxon_ids.len() {
            return Err(EcoError::MalformedDataset(
                "duplicate taxon ids in taxonomy".to_string(),
            ));
        }
        Ok(Self {
            ranks,
            taxon_ids,
            assignments,
        })
    }

    /// Load a taxonomy table from a TSV file.
    ///
    /// First row: header with rank names (first cell is the taxon-id column
    /// header). Empty cells and `NA` are unassigned.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| EcoError::MalformedDataset("empty taxonomy TSV".to_string()))??;
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(EcoError::MalformedDataset(
                "taxonomy TSV must have at least one rank column".to_string(),
            ));
        }
        let ranks: Vec<String> = header[1..].iter().map(|s| s.to_string()).collect();

        let mut taxon_ids = Vec::new();
        let mut assignments = Vec::new();
        for line_result in lines {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            taxon_ids.push(fields[0].to_string());
            let mut row = Vec::with_capacity(ranks.len());
            for idx in 0..ranks.len() {
                let raw = fields.get(idx + 1).map(|s| s.trim()).unwrap_or("");
                if raw.is_empty() || raw.eq_ignore_ascii_case("na") {
                    row.push(None);
                } else {
                    row.push(Some(raw.to_string()));
                }
            }
            assignments.push(row);
        }

        Self::new(ranks, taxon_ids, assignments)
    }

    /// Write the table to a TSV file. Unassigned ranks are written as `NA`.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "taxon_id")?;
        for rank in &self.ranks {
            write!(writer, "\t{}", rank)?;
        }
        writeln!(writer)?;

        for (taxon_id, row) in self.taxon_ids.iter().zip(&self.assignments) {
            write!(writer, "{}", taxon_id)?;
            for assignment in row {
                write!(writer, "\t{}", assignment.as_deref().unwrap_or("NA"))?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    /// Rank names, coarsest first.
    pub fn ranks(&self) -> &[String] {
        &self.ranks
    }

    /// Taxon identifiers.
    pub fn taxon_ids(&self) -> &[String] {
        &self.taxon_ids
    }

    /// Number of taxa.
    pub fn n_taxa(&self) -> usize {
        self.taxon_ids.len()
    }

    /// Index of a rank name. Fails with `UnknownRank`.
    pub fn rank_index(&self, rank: &str) -> Result<usize> {
        self.ranks
            .iter()
            .position(|r| r == rank)
            .ok_or_else(|| EcoError::UnknownRank(rank.to_string()))
    }

    /// Row index of a taxon id, if present.
    pub fn taxon_index(&self, taxon_id: &str) -> Option<usize> {
        self.taxon_ids.iter().position(|t| t == taxon_id)
    }

    /// Check if a taxon has a row.
    pub fn has_taxon(&self, taxon_id: &str) -> bool {
        self.taxon_index(taxon_id).is_some()
    }

    /// Assignments of a taxon, in rank order.
    pub fn assignments(&self, taxon_id: &str) -> Option<&[Option<String>]> {
        self.taxon_index(taxon_id)
            .map(|idx| self.assignments[idx].as_slice())
    }

    /// The record for one taxon, usable by subset predicates.
    pub fn record(&self, taxon_id: &str) -> Option<TaxonRecord<'_>> {
        self.taxon_index(taxon_id).map(|idx| TaxonRecord {
            taxon_id: &self.taxon_ids[idx],
            ranks: &self.ranks,
            assignments: &self.assignments[idx],
        })
    }

    /// The record at a row index.
    pub fn record_at(&self, idx: usize) -> TaxonRecord<'_> {
        TaxonRecord {
            taxon_id: &self.taxon_ids[idx],
            ranks: &self.ranks,
            assignments: &self.assignments[idx],
        }
    }

    /// Subset to the taxa present in `keep`, preserving table order.
    ///
    /// Taxa in `keep` without a taxonomy row are ignored; the taxonomy axis
    /// is allowed to be a subset of the abundance axis.
    pub fn restrict_to(&self, keep: &HashSet<&str>) -> Self {
        let mut taxon_ids = Vec::new();
        let mut assignments = Vec::new();
        for (taxon_id, row) in self.taxon_ids.iter().zip(&self.assignments) {
            if keep.contains(taxon_id.as_str()) {
                taxon_ids.push(taxon_id.clone());
                assignments.push(row.clone());
            }
        }
        Self {
            ranks: self.ranks.clone(),
            taxon_ids,
            assignments,
        }
    }

    /// Replace one taxon's assignments, returning a new table.
    pub fn with_assignments(&self, taxon_id: &str, row: Vec<Option<String>>) -> Result<Self> {
        let idx = self
            .taxon_index(taxon_id)
            .ok_or_else(|| EcoError::MalformedDataset(format!("taxon '{}' not in taxonomy", taxon_id)))?;
        if row.len() != self.ranks.len() {
            return Err(EcoError::MalformedDataset(format!(
                "assignment row has {} entries for {} ranks",
                row.len(),
                self.ranks.len()
            )));
        }
        let mut assignments = self.assignments.clone();
        assignments[idx] = row;
        Ok(Self {
            ranks: self.ranks.clone(),
            taxon_ids: self.taxon_ids.clone(),
            assignments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn create_test_table() -> TaxonomyTable {
        TaxonomyTable::new(
            vec!["Kingdom".to_string(), "Phylum".to_string(), "Genus".to_string()],
            vec!["T1".to_string(), "T2".to_string(), "T3".to_string()],
            vec![
                vec![
                    Some("Bacteria".to_string()),
                    Some("Firmicutes".to_string()),
                    Some("Bacillus".to_string()),
                ],
                vec![
                    Some("Bacteria".to_string()),
                    Some("Firmicutes".to_string()),
                    None,
                ],
                vec![
                    Some("Bacteria".to_string()),
                    Some("Proteobacteria".to_string()),
                    Some("Vibrio".to_string()),
                ],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_rank_index() {
        let tax = create_test_table();
        assert_eq!(tax.rank_index("Phylum").unwrap(), 1);
        assert!(matches!(
            tax.rank_index("Species"),
            Err(EcoError::UnknownRank(_))
        ));
    }

    #[test]
    fn test_record() {
        let tax = create_test_table();
        let rec = tax.record("T3").unwrap();
        assert_eq!(rec.assignment("Phylum"), Some("Proteobacteria"));
        assert_eq!(rec.assignment("Species"), None);
        let rec = tax.record("T2").unwrap();
        assert_eq!(rec.assignment("Genus"), None);
    }

    #[test]
    fn test_restrict_to() {
        let tax = create_test_table();
        let keep: HashSet<&str> = ["T3", "T1"].into_iter().collect();
        let sub = tax.restrict_to(&keep);
        assert_eq!(sub.taxon_ids(), &["T1", "T3"]);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let res = TaxonomyTable::new(
            vec!["Kingdom".to_string()],
            vec!["T1".to_string()],
            vec![vec![None, None]],
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_tsv_roundtrip() {
        let tax = create_test_table();
        let file = NamedTempFile::new().unwrap();
        tax.to_tsv(file.path()).unwrap();
        let loaded = TaxonomyTable::from_tsv(file.path()).unwrap();
        assert_eq!(loaded.ranks(), tax.ranks());
        assert_eq!(loaded.taxon_ids(), tax.taxon_ids());
        assert_eq!(loaded.assignments("T2"), tax.assignments("T2"));
    }

    #[test]
    fn test_tsv_missing_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "taxon_id\tKingdom\tGenus").unwrap();
        writeln!(file, "T1\tBacteria\tNA").unwrap();
        writeln!(file, "T2\tBacteria\t").unwrap();
        file.flush().unwrap();

        let tax = TaxonomyTable::from_tsv(file.path()).unwrap();
        assert_eq!(tax.record("T1").unwrap().assignment("Genus"), None);
        assert_eq!(tax.record("T2").unwrap().assignment("Genus"), None);
    }
}
