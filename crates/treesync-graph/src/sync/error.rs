//! Errors surfaced by sync runs and the control surface.

use thiserror::Error;
use treesync_core::ConfigError;
use treesync_source::SourceError;

use crate::error::GraphError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid mapping configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Source read failed: {0}")]
    SourceRead(#[from] SourceError),

    #[error("Graph write failed: {0}")]
    GraphWrite(#[from] GraphError),

    #[error("Connection failed: {0}")]
    FatalConnection(String),

    #[error("A sync is already running for source '{0}'")]
    AlreadyRunning(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
