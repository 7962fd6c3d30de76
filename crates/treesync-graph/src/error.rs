//! Graph-side error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Neo4j error: {0}")]
    Neo4j(#[from] neo4rs::Error),

    #[error("Graph store unavailable: {0}")]
    Connection(String),

    #[error("Statement failed: {0}")]
    Statement(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),
}

pub type GraphResult<T> = Result<T, GraphError>;
