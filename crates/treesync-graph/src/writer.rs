//! Graph write seam used by the sync engine.

use async_trait::async_trait;
use treesync_core::MutationOp;

use crate::error::GraphResult;

/// A graph store that accepts batched mutation operations.
#[async_trait]
pub trait GraphWriter: Send + Sync {
    /// Verify the store is reachable.
    async fn check(&self) -> GraphResult<()>;

    /// Create a uniqueness constraint on `(label, property)` if missing.
    async fn ensure_constraint(&self, label: &str, property: &str) -> GraphResult<()>;

    async fn begin(&self) -> GraphResult<Box<dyn GraphTransaction>>;
}

/// One open write transaction.
///
/// After a failed `run` the transaction may be unusable, as a Neo4j
/// transaction is once the server reports a failure: callers roll it back
/// instead of running more statements in it.
#[async_trait]
pub trait GraphTransaction: Send {
    async fn run(&mut self, op: &MutationOp) -> GraphResult<()>;

    async fn commit(self: Box<Self>) -> GraphResult<()>;

    async fn rollback(self: Box<Self>) -> GraphResult<()>;
}
