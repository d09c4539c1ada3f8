//! Error types for abyss-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in abyss-core
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse CSV
    #[error("failed to parse CSV '{path}': {message}")]
    CsvParse { path: PathBuf, message: String },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The base grid table is absent; nothing can be fused without it
    #[error("required source '{path}' not found")]
    MissingRequiredSource { path: PathBuf },

    /// A column the pipeline relies on is not in the table
    #[error("column '{column}' not found in '{path}'")]
    MissingColumn { column: String, path: PathBuf },

    /// A value does not match the type declared for its column
    #[error("invalid {expected} value '{value}' in column '{column}' at line {line} of '{path}'")]
    InvalidValue {
        path: PathBuf,
        line: usize,
        column: String,
        value: String,
        expected: &'static str,
    },

    /// Two base rows share the same (row, col)
    #[error("duplicate cell ({row}, {col}) in '{path}'")]
    DuplicateCellKey { row: i64, col: i64, path: PathBuf },

    /// A join would duplicate or drop grid rows
    #[error("join with '{source_name}' changes grid cardinality: {detail}")]
    JoinCardinalityViolation { source_name: String, detail: String },

    /// A merged column would overwrite an existing grid column
    #[error("column '{0}' already exists in the grid")]
    ColumnCollision(String),

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// Invalid configuration file
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration could not be rendered
    #[error("failed to render configuration: {0}")]
    ConfigRender(#[from] toml::ser::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io(err.error)
    }
}
