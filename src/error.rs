//! Error types for the community-ecology library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum EcoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed dataset: {0}")]
    MalformedDataset(String),

    #[error("Empty selection: {0}")]
    EmptySelection(String),

    #[error("Unknown metadata variable '{0}'")]
    UnknownVariable(String),

    #[error("Unknown taxonomic rank '{0}'")]
    UnknownRank(String),

    #[error("Unknown diversity measure '{0}'")]
    UnknownMeasure(String),

    #[error("Operation '{0}' requires a phylogenetic tree, but the dataset has none")]
    MissingTree(String),

    #[error("Sample '{sample_id}' has zero total abundance, cannot normalize")]
    DivisionByZero { sample_id: String },

    #[error("Invalid archetype: {0}")]
    InvalidArchetype(String),

    #[error("Invalid abundance value '{value}' at row {row}, column {col}")]
    InvalidValue {
        value: String,
        row: usize,
        col: usize,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, EcoError>;
