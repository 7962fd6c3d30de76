//! Application state.

use std::sync::Arc;
use treesync_graph::SyncEngine;
use treesync_source::SourceRegistry;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: SyncEngine,
    pub registry: Arc<SourceRegistry>,
}

impl AppState {
    pub fn new(engine: SyncEngine, registry: Arc<SourceRegistry>) -> Self {
        Self { engine, registry }
    }

    /// 404 for identifiers missing from the registry.
    pub fn require_source(&self, source_id: &str) -> Result<(), (axum::http::StatusCode, String)> {
        if self.registry.contains(source_id) {
            Ok(())
        } else {
            Err((
                axum::http::StatusCode::NOT_FOUND,
                format!("Unknown source: {}", source_id),
            ))
        }
    }
}
