//! Library error type.
//!
//! Every failure carries the file, column or key it concerns so callers can
//! report it without further lookups. Command handlers wrap these in
//! `anyhow` context at the CLI boundary.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StewardError>;

#[derive(Debug, Error)]
pub enum StewardError {
    /// A referenced column is not present in the registry.
    #[error("column '{column}' not found in any file")]
    ColumnNotFound { column: String },

    /// The registry lists a dataset for a column but the dataset no longer
    /// carries it (or the dataset itself is gone).
    #[error("column '{column}' expected in '{dataset}' but not found there")]
    ColumnMissingInDataset { column: String, dataset: String },

    #[error("dataset '{dataset}' is not loaded")]
    DatasetNotFound { dataset: String },

    /// A required field is absent from a metadata table header.
    #[error("field '{field}' not found in '{dataset}'")]
    FieldNotFound { field: String, dataset: String },

    #[error("file {path:?} does not exist")]
    FileNotFound { path: PathBuf },

    #[error("path {path:?} does not exist or is not a directory")]
    FolderNotFound { path: PathBuf },

    /// Rename target already exists; two distinct columns are never merged.
    #[error("column '{column}' already exists in {}", .datasets.join(", "))]
    Conflict {
        column: String,
        datasets: Vec<String>,
    },

    /// Projections are never written over their source folder.
    #[error("output directory {path:?} is the source folder")]
    OutputOverlapsSource { path: PathBuf },

    #[error("invalid column name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("failed to parse {path:?}: {message}")]
    ParseFailure { path: PathBuf, message: String },

    /// Rows could not be rendered, e.g. text the output encoding cannot hold.
    #[error("failed to render {target}: {message}")]
    RenderFailure { target: String, message: String },

    #[error("failed to write {path:?}: {source}")]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two metadata rows disagree about the same lookup key.
    #[error("ambiguous mapping for key {key}: {candidates:?}")]
    AmbiguousResolution {
        key: String,
        candidates: Vec<String>,
    },
}

impl StewardError {
    pub fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        StewardError::ParseFailure {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StewardError::IoFailure {
            path: path.into(),
            source,
        }
    }

    /// True for the "referenced thing is absent" family.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StewardError::ColumnNotFound { .. }
                | StewardError::ColumnMissingInDataset { .. }
                | StewardError::DatasetNotFound { .. }
                | StewardError::FieldNotFound { .. }
                | StewardError::FileNotFound { .. }
                | StewardError::FolderNotFound { .. }
        )
    }
}
