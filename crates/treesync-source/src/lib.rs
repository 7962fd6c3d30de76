//! treesync relational source layer
//!
//! Read-only access to the relational side of a sync: full-table scans,
//! single-record lookups by natural key and child queries by parent link.
//! Rows are streamed, so a large root table is never held in memory.

pub mod error;
pub mod memory;
pub mod reader;
pub mod registry;
pub mod sqlite;

pub use error::{SourceError, SourceResult};
pub use memory::{MemoryConnector, MemoryReader};
pub use reader::{RelationalReader, RowStream, SourceConnector};
pub use registry::SourceRegistry;
pub use sqlite::SqliteReader;
