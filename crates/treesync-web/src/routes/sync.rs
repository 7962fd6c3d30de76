//! Sync control: trigger, status and mapping configuration.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use treesync_core::SyncRun;
use uuid::Uuid;

use super::sync_error;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub source_id: String,
    pub run_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MappingSaved {
    pub source_id: String,
    pub saved: bool,
}

pub async fn trigger_sync(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<TriggerResponse>), (StatusCode, String)> {
    state.require_source(&id)?;
    let run_id = state.engine.trigger(&id).map_err(sync_error)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            source_id: id,
            run_id,
        }),
    ))
}

pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SyncRun>, (StatusCode, String)> {
    state.require_source(&id)?;
    Ok(Json(state.engine.status(&id)))
}

/// Raw TOML, the default template when nothing was saved yet.
pub async fn get_mapping(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state.require_source(&id)?;
    let text = state.engine.mapping(&id).await.map_err(sync_error)?;
    Ok(([(header::CONTENT_TYPE, "application/toml; charset=utf-8")], text))
}

pub async fn save_mapping(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: String,
) -> Result<Json<MappingSaved>, (StatusCode, String)> {
    state.require_source(&id)?;
    state
        .engine
        .save_mapping(&id, &body)
        .await
        .map_err(sync_error)?;
    Ok(Json(MappingSaved {
        source_id: id,
        saved: true,
    }))
}
