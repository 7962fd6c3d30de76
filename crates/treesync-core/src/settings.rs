//! Application settings.
//!
//! Read from a TOML file (default `treesync.toml`), then overridden by
//! `NEO4J_URI`, `NEO4J_USER` and `NEO4J_PASSWORD` when set.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};

/// Default settings file name, looked up in the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "treesync.toml";

/// Default number of queued mutations that triggers a flush.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Default interval of the scheduled sync, in seconds.
pub const DEFAULT_SCHEDULE_SECS: u64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub graph: GraphSettings,
    pub server: ServerSettings,
    pub sync: SyncSettings,
    pub sources: Vec<SourceSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub batch_size: usize,
    /// Seconds between scheduled runs; 0 disables the scheduler.
    pub schedule_secs: u64,
    pub mapping_dir: PathBuf,
}

/// A relational source the engine can synchronize.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceSettings {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Path of the SQLite database file.
    pub path: PathBuf,
    #[serde(default)]
    pub sync_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            graph: GraphSettings::default(),
            server: ServerSettings::default(),
            sync: SyncSettings::default(),
            sources: Vec::new(),
        }
    }
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "neo4j".to_string(),
            database: "neo4j".to_string(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3030,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            schedule_secs: DEFAULT_SCHEDULE_SECS,
            mapping_dir: PathBuf::from("mappings"),
        }
    }
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml(text: &str) -> ConfigResult<Self> {
        let settings: Settings =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.message().to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from a file; a missing file yields the defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let mut settings = match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                return Err(ConfigError::invalid(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        settings.apply_env();
        Ok(settings)
    }

    /// Apply `NEO4J_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(uri) = std::env::var("NEO4J_URI") {
            self.graph.uri = uri;
        }
        if let Ok(user) = std::env::var("NEO4J_USER") {
            self.graph.user = user;
        }
        if let Ok(password) = std::env::var("NEO4J_PASSWORD") {
            self.graph.password = password;
        }
    }

    pub fn source(&self, id: &str) -> Option<&SourceSettings> {
        self.sources.iter().find(|s| s.id == id)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.sync.batch_size == 0 {
            return Err(ConfigError::invalid("sync.batch_size must be at least 1"));
        }
        let mut seen = std::collections::HashSet::new();
        for source in &self.sources {
            crate::config_store::check_source_id(&source.id)?;
            if !seen.insert(source.id.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "source '{}' is defined twice",
                    source.id
                )));
            }
        }
        Ok(())
    }
}
