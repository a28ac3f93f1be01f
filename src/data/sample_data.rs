//! Per-sample metadata table.

use crate::error::{EcoError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A metadata value: categorical, continuous, boolean, or missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    /// Categorical variable with string levels.
    Categorical(String),
    /// Continuous numeric variable.
    Continuous(f64),
    /// Boolean variable.
    Boolean(bool),
    /// Missing value.
    Missing,
}

impl Variable {
    /// Check if this is a missing value.
    pub fn is_missing(&self) -> bool {
        matches!(self, Variable::Missing)
    }

    /// Try to get as categorical string.
    pub fn as_categorical(&self) -> Option<&str> {
        match self {
            Variable::Categorical(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as continuous f64.
    pub fn as_continuous(&self) -> Option<f64> {
        match self {
            Variable::Continuous(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as boolean.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Variable::Boolean(v) => Some(*v),
            _ => None,
        }
    }
}

/// Type hint for columns when loading metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    Categorical,
    Continuous,
    Boolean,
}

/// One sample's metadata record, as seen by subset predicates.
#[derive(Debug, Clone, Copy)]
pub struct SampleRecord<'a> {
    sample_id: &'a str,
    values: &'a HashMap<String, Variable>,
}

impl<'a> SampleRecord<'a> {
    /// The sample this record belongs to.
    pub fn sample_id(&self) -> &'a str {
        self.sample_id
    }

    /// Value of a variable, `Missing` if the column is absent.
    pub fn get(&self, column: &str) -> &'a Variable {
        self.values.get(column).unwrap_or(&Variable::Missing)
    }

    /// Categorical value of a variable, if it has one.
    pub fn categorical(&self, column: &str) -> Option<&'a str> {
        self.values.get(column).and_then(|v| v.as_categorical())
    }

    /// Continuous value of a variable, if it has one.
    pub fn continuous(&self, column: &str) -> Option<f64> {
        self.values.get(column).and_then(|v| v.as_continuous())
    }

    /// Boolean value of a variable, if it has one.
    pub fn boolean(&self, column: &str) -> Option<bool> {
        self.values.get(column).and_then(|v| v.as_boolean())
    }
}

/// Sample metadata: one record of typed variables per sample.
#[derive(Debug, Clone, Default)]
pub struct SampleData {
    /// Sample IDs in order.
    sample_ids: Vec<String>,
    /// Column names in order.
    column_names: Vec<String>,
    /// Data stored as sample_id -> column_name -> Variable.
    data: HashMap<String, HashMap<String, Variable>>,
    /// Type of each column.
    column_types: HashMap<String, VariableType>,
}

impl SampleData {
    /// Build metadata from explicit columns.
    ///
    /// `columns` maps column name -> one value per sample, in sample order.
    pub fn from_columns(
        sample_ids: Vec<String>,
        columns: Vec<(String, Vec<Variable>)>,
    ) -> Result<Self> {
        let mut column_names = Vec::with_capacity(columns.len());
        let mut column_types = HashMap::new();
        let mut data: HashMap<String, HashMap<String, Variable>> = sample_ids
            .iter()
            .map(|sid| (sid.clone(), HashMap::new()))
            .collect();
        if data.len() != sample_ids.len() {
            return Err(EcoError::MalformedDataset(
                "duplicate sample ids in metadata".to_string(),
            ));
        }

        for (name, values) in columns {
            if values.len() != sample_ids.len() {
                return Err(EcoError::MalformedDataset(format!(
                    "column '{}' has {} values for {} samples",
                    name,
                    values.len(),
                    sample_ids.len()
                )));
            }
            column_types.insert(name.clone(), infer_type(&values));
            for (sid, value) in sample_ids.iter().zip(values) {
                if let Some(record) = data.get_mut(sid) {
                    record.insert(name.clone(), value);
                }
            }
            column_names.push(name);
        }

        Ok(Self {
            sample_ids,
            column_names,
            data,
            column_types,
        })
    }

    /// Load metadata from a TSV file.
    ///
    /// First row: header with column names (first cell is the sample-id
    /// column header). Columns are inferred as continuous if all values parse
    /// as numbers, boolean if all values are true/false, else categorical.
    /// Empty cells and `NA` are missing.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| EcoError::MalformedDataset("empty metadata TSV".to_string()))??;
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(EcoError::MalformedDataset(
                "metadata TSV must have at least one variable column".to_string(),
            ));
        }
        let column_names: Vec<String> = header[1..].iter().map(|s| s.to_string()).collect();

        let mut raw_data: Vec<(String, Vec<String>)> = Vec::new();
        for line_result in lines {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let sample_id = fields[0].to_string();
            let values: Vec<String> = fields[1..].iter().map(|s| s.to_string()).collect();
            raw_data.push((sample_id, values));
        }

        if raw_data.is_empty() {
            return Err(EcoError::MalformedDataset(
                "no samples in metadata TSV".to_string(),
            ));
        }

        // Infer column types from all non-missing values.
        let mut column_types = HashMap::new();
        for (col_idx, col_name) in column_names.iter().enumerate() {
            let mut all_numeric = true;
            let mut all_boolean = true;
            for (_, values) in &raw_data {
                let raw = values.get(col_idx).map(|s| s.trim()).unwrap_or("");
                if raw.is_empty() || raw.eq_ignore_ascii_case("na") {
                    continue;
                }
                if raw.parse::<f64>().is_err() {
                    all_numeric = false;
                }
                if !raw.eq_ignore_ascii_case("true") && !raw.eq_ignore_ascii_case("false") {
                    all_boolean = false;
                }
            }
            let var_type = if all_boolean {
                VariableType::Boolean
            } else if all_numeric {
                VariableType::Continuous
            } else {
                VariableType::Categorical
            };
            column_types.insert(col_name.clone(), var_type);
        }

        let mut sample_ids = Vec::new();
        let mut data = HashMap::new();
        for (sample_id, values) in raw_data {
            let mut sample_data = HashMap::new();
            for (col_idx, col_name) in column_names.iter().enumerate() {
                let raw = values.get(col_idx).map(|s| s.trim()).unwrap_or("");
                let var = if raw.is_empty() || raw.eq_ignore_ascii_case("na") {
                    Variable::Missing
                } else {
                    match column_types[col_name] {
                        VariableType::Continuous => raw
                            .parse::<f64>()
                            .map(Variable::Continuous)
                            .unwrap_or(Variable::Missing),
                        VariableType::Boolean => Variable::Boolean(raw.eq_ignore_ascii_case("true")),
                        VariableType::Categorical => Variable::Categorical(raw.to_string()),
                    }
                };
                sample_data.insert(col_name.clone(), var);
            }
            if data.insert(sample_id.clone(), sample_data).is_some() {
                return Err(EcoError::MalformedDataset(format!(
                    "duplicate sample id '{}' in metadata",
                    sample_id
                )));
            }
            sample_ids.push(sample_id);
        }

        Ok(Self {
            sample_ids,
            column_names,
            data,
            column_types,
        })
    }

    /// Sample IDs in order.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Column names in order.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Number of variable columns.
    pub fn n_columns(&self) -> usize {
        self.column_names.len()
    }

    /// Get a value for a specific sample and column.
    pub fn get(&self, sample_id: &str, column: &str) -> Option<&Variable> {
        self.data.get(sample_id).and_then(|m| m.get(column))
    }

    /// The record for one sample, usable by subset predicates.
    pub fn record(&self, sample_id: &str) -> Option<SampleRecord<'_>> {
        self.data.get_key_value(sample_id).map(|(sid, values)| SampleRecord {
            sample_id: sid,
            values,
        })
    }

    /// All values of a column, in sample order. Fails with `UnknownVariable`.
    pub fn column(&self, column: &str) -> Result<Vec<&Variable>> {
        if !self.has_column(column) {
            return Err(EcoError::UnknownVariable(column.to_string()));
        }
        Ok(self
            .sample_ids
            .iter()
            .map(|sid| {
                self.data
                    .get(sid)
                    .and_then(|m| m.get(column))
                    .unwrap_or(&Variable::Missing)
            })
            .collect())
    }

    /// The type of a column.
    pub fn column_type(&self, column: &str) -> Option<VariableType> {
        self.column_types.get(column).copied()
    }

    /// Unique levels of a categorical column, sorted.
    pub fn levels(&self, column: &str) -> Result<Vec<String>> {
        let values = self.column(column)?;
        let mut levels: Vec<String> = values
            .iter()
            .filter_map(|v| v.as_categorical().map(String::from))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        levels.sort();
        Ok(levels)
    }

    /// Check if a sample exists.
    pub fn has_sample(&self, sample_id: &str) -> bool {
        self.data.contains_key(sample_id)
    }

    /// Check if a column exists.
    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }

    /// Subset to the given samples, in the given order.
    ///
    /// Fails with `MalformedDataset` if a requested sample is absent.
    pub fn subset_samples(&self, sample_ids: &[String]) -> Result<Self> {
        let mut new_data = HashMap::new();
        let mut new_sample_ids = Vec::with_capacity(sample_ids.len());

        for sid in sample_ids {
            match self.data.get(sid) {
                Some(sample_data) => {
                    new_data.insert(sid.clone(), sample_data.clone());
                    new_sample_ids.push(sid.clone());
                }
                None => {
                    return Err(EcoError::MalformedDataset(format!(
                        "sample '{}' not found in metadata",
                        sid
                    )))
                }
            }
        }

        Ok(Self {
            sample_ids: new_sample_ids,
            column_names: self.column_names.clone(),
            data: new_data,
            column_types: self.column_types.clone(),
        })
    }

    /// Reorder to match an abundance sample axis. Same samples required.
    pub fn align_to(&self, sample_ids: &[String]) -> Result<Self> {
        if sample_ids.len() != self.sample_ids.len() {
            return Err(EcoError::MalformedDataset(format!(
                "metadata has {} samples, abundance axis has {}",
                self.sample_ids.len(),
                sample_ids.len()
            )));
        }
        self.subset_samples(sample_ids)
    }
}

fn infer_type(values: &[Variable]) -> VariableType {
    let mut saw_continuous = false;
    let mut saw_boolean = false;
    for v in values {
        match v {
            Variable::Categorical(_) => return VariableType::Categorical,
            Variable::Continuous(_) => saw_continuous = true,
            Variable::Boolean(_) => saw_boolean = true,
            Variable::Missing => {}
        }
    }
    if saw_boolean && !saw_continuous {
        VariableType::Boolean
    } else {
        VariableType::Continuous
    }
}
