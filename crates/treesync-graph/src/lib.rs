//! # treesync graph
//!
//! Neo4j integration and the hierarchy sync engine.
//!
//! Reads a unit/device hierarchy from a relational source and MERGEs it into
//! the graph in batched transactions. The engine depends only on the
//! [`GraphWriter`] and [`treesync_source::RelationalReader`] seams, so the
//! same run logic drives Neo4j, the in-memory graph and the test fakes.

pub mod client;
pub mod cypher;
pub mod error;
pub mod memory;
pub mod neo4j;
pub mod schema;
pub mod sync;
pub mod writer;

pub use client::{GraphClient, GraphConfig, GraphCounts};
pub use error::{GraphError, GraphResult};
pub use memory::{MemoryGraph, MemoryNode};
pub use neo4j::Neo4jWriter;
pub use sync::scheduler::{spawn_scheduler, trigger_enabled};
pub use sync::{RunReport, Stage, SyncEngine, SyncError};
pub use writer::{GraphTransaction, GraphWriter};
