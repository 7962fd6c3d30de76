//! Configured sources and their sync toggle.

use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;
use treesync_core::SourceSettings;

use crate::error::{SourceError, SourceResult};
use crate::reader::{RelationalReader, SourceConnector};
use crate::sqlite::SqliteReader;

/// The sources named in the settings file.
///
/// The enabled flag starts from the settings and can be flipped at runtime;
/// flips are not written back to disk.
#[derive(Default)]
pub struct SourceRegistry {
    sources: RwLock<Vec<SourceSettings>>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<SourceSettings>) -> Self {
        Self {
            sources: RwLock::new(sources),
        }
    }

    pub fn list(&self) -> Vec<SourceSettings> {
        self.sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, source_id: &str) -> Option<SourceSettings> {
        self.sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|s| s.id == source_id)
            .cloned()
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.get(source_id).is_some()
    }

    /// Set whether scheduled runs include this source.
    pub fn set_enabled(&self, source_id: &str, enabled: bool) -> SourceResult<()> {
        let mut sources = self.sources.write().unwrap_or_else(PoisonError::into_inner);
        let source = sources
            .iter_mut()
            .find(|s| s.id == source_id)
            .ok_or_else(|| SourceError::UnknownSource(source_id.to_string()))?;
        source.sync_enabled = enabled;
        info!(source_id, enabled, "Sync toggled");
        Ok(())
    }

    pub fn enabled_ids(&self) -> Vec<String> {
        self.sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.sync_enabled)
            .map(|s| s.id.clone())
            .collect()
    }
}

#[async_trait]
impl SourceConnector for SourceRegistry {
    async fn connect(&self, source_id: &str) -> SourceResult<Arc<dyn RelationalReader>> {
        let source = self
            .get(source_id)
            .ok_or_else(|| SourceError::UnknownSource(source_id.to_string()))?;
        let path = source.path.clone();
        let reader = tokio::task::spawn_blocking(move || SqliteReader::open(&path))
            .await?
            .map_err(|e| SourceError::Connect {
                source_id: source_id.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Arc::new(reader))
    }
}
