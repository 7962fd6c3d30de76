//! Source listing and the sync toggle.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use treesync_core::{RunStatus, SourceSettings};

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct SourceView {
    pub id: String,
    pub name: String,
    pub sync_enabled: bool,
    pub running: bool,
    pub status: RunStatus,
}

#[derive(Deserialize)]
pub struct ToggleRequest {
    pub enabled: bool,
}

fn view(state: &AppState, source: SourceSettings) -> SourceView {
    SourceView {
        running: state.engine.is_running(&source.id),
        status: state.engine.status(&source.id).status,
        id: source.id,
        name: source.name,
        sync_enabled: source.sync_enabled,
    }
}

pub async fn list_sources(State(state): State<AppState>) -> Json<Vec<SourceView>> {
    let sources = state
        .registry
        .list()
        .into_iter()
        .map(|source| view(&state, source))
        .collect();
    Json(sources)
}

pub async fn toggle_sync(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ToggleRequest>,
) -> Result<Json<SourceView>, (StatusCode, String)> {
    state
        .registry
        .set_enabled(&id, req.enabled)
        .map_err(|e| (StatusCode::NOT_FOUND, e.to_string()))?;
    info!(source_id = %id, enabled = req.enabled, "Scheduled sync toggled via API");

    let source = state
        .registry
        .get(&id)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Unknown source: {}", id)))?;
    Ok(Json(view(&state, source)))
}
