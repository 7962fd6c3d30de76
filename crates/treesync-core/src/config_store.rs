//! Mapping configuration persistence.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::mapping::DEFAULT_MAPPING;

/// Loads and saves the raw mapping text of each source.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Mapping text for a source, or the built-in template when none was saved.
    async fn load(&self, source_id: &str) -> io::Result<String>;

    async fn save(&self, source_id: &str, text: &str) -> io::Result<()>;
}

/// Reject identifiers that could escape the mapping directory.
pub fn check_source_id(source_id: &str) -> Result<(), ConfigError> {
    let valid = !source_id.is_empty()
        && source_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !source_id.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidSourceId(source_id.to_string()))
    }
}

/// Stores `mapping-<source_id>.toml` files in one directory.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    dir: PathBuf,
}

impl FileConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, source_id: &str) -> io::Result<PathBuf> {
        check_source_id(source_id)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        Ok(self.dir.join(format!("mapping-{}.toml", source_id)))
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load(&self, source_id: &str) -> io::Result<String> {
        let path = self.path_for(source_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                debug!(path = %path.display(), "Loaded mapping config");
                Ok(text)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(source_id, "No mapping config saved, using default template");
                Ok(DEFAULT_MAPPING.to_string())
            }
            Err(e) => Err(e),
        }
    }

    async fn save(&self, source_id: &str, text: &str) -> io::Result<()> {
        let path = self.path_for(source_id)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, text).await?;
        info!(path = %path.display(), "Saved mapping config");
        Ok(())
    }
}

/// In-memory store, used by tests and dry runs.
#[derive(Default)]
pub struct MemoryConfigStore {
    mappings: RwLock<HashMap<String, String>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with one mapping.
    pub fn with_mapping(source_id: &str, text: &str) -> Self {
        let mut mappings = HashMap::new();
        mappings.insert(source_id.to_string(), text.to_string());
        Self {
            mappings: RwLock::new(mappings),
        }
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self, source_id: &str) -> io::Result<String> {
        Ok(self
            .mappings
            .read()
            .await
            .get(source_id)
            .cloned()
            .unwrap_or_else(|| DEFAULT_MAPPING.to_string()))
    }

    async fn save(&self, source_id: &str, text: &str) -> io::Result<()> {
        self.mappings
            .write()
            .await
            .insert(source_id.to_string(), text.to_string());
        Ok(())
    }
}
