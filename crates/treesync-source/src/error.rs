//! Error types for source access.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cannot open source '{source_id}': {reason}")]
    Connect { source_id: String, reason: String },

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Unsupported query: {0}")]
    Unsupported(String),

    #[error("Read failed: {0}")]
    Read(String),

    #[error("Reader task failed: {0}")]
    Worker(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

impl From<tokio::task::JoinError> for SourceError {
    fn from(e: tokio::task::JoinError) -> Self {
        SourceError::Worker(e.to_string())
    }
}
