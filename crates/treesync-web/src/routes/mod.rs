//! Route handlers.

pub mod sources;
pub mod sync;

use axum::http::StatusCode;
use treesync_graph::SyncError;

/// Map engine errors onto HTTP status codes.
pub(crate) fn sync_error(e: SyncError) -> (StatusCode, String) {
    let status = match &e {
        SyncError::AlreadyRunning(_) => StatusCode::CONFLICT,
        SyncError::UnknownSource(_) => StatusCode::NOT_FOUND,
        SyncError::Config(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}
