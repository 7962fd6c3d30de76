//! Configuration error types.

use thiserror::Error;

/// Errors raised while loading or validating a mapping configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to parse mapping configuration: {0}")]
    Parse(String),

    #[error("Mapping configuration is empty")]
    Empty,

    #[error("Required node type '{0}' is missing")]
    MissingNodeType(String),

    #[error("Required relationship type '{0}' is missing")]
    MissingRelationship(String),

    #[error("Relationship '{relationship}' references unknown node type '{node}'")]
    UnknownNodeReference { relationship: String, node: String },

    #[error("Node type '{node}' primary key '{property}' is not listed in its properties")]
    MissingPrimaryKey { node: String, property: String },

    #[error("Dynamic label rule of node type '{node}' uses field '{field}' which is not mapped in its properties")]
    DynamicLabelField { node: String, field: String },

    #[error("Source table '{table}' has no column(s) {columns} used by the mapping")]
    MissingColumns { table: String, columns: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid source identifier: '{0}'")]
    InvalidSourceId(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    /// Create an invalid-configuration error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}
