//! treesync core library
//!
//! Mapping model, source values, mutation operations and run bookkeeping
//! shared by the reader, graph and web crates.

pub mod config_store;
pub mod error;
pub mod logs;
pub mod mapping;
pub mod mutation;
pub mod settings;
pub mod status;
pub mod value;

pub use config_store::{ConfigStore, FileConfigStore, MemoryConfigStore};
pub use error::{ConfigError, ConfigResult};
pub use logs::{LogLevel, LogLine, LogReceiver, SyncLogHub};
pub use mapping::model::{
    DynamicLabelRule, HierarchyLinks, MappingSpec, NodeType, PropertyMap, RelationshipType,
    RootSlot, RootsLayout, SyncPlan,
};
pub use mapping::DEFAULT_MAPPING;
pub use mutation::MutationOp;
pub use settings::{GraphSettings, ServerSettings, Settings, SourceSettings, SyncSettings};
pub use status::model::{RunOutcome, RunStatus, SyncEvent, SyncRun};
pub use status::store::{InMemoryStatusStore, StatusStore};
pub use value::{PropertyValue, Row, SourceValue};
