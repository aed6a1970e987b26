// Movie Normalizer Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Source file unavailable: {path}: {reason}")]
    SourceUnavailable { path: String, reason: String },

    #[error("Column '{column}' missing from {file}")]
    MissingColumn { file: String, column: String },

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for NormalizeError {
    fn from(err: anyhow::Error) -> Self {
        NormalizeError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NormalizeError>;

/// Row-level failure. The row is skipped and counted, never fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("missing {column}")]
    MissingId { column: &'static str },

    #[error("invalid {column} '{value}'")]
    InvalidId { column: &'static str, value: String },

    #[error("missing {column}")]
    MissingField { column: &'static str },

    #[error("invalid {column} '{value}'")]
    InvalidField { column: &'static str, value: String },
}
