//! WebSocket stream of a source's run log.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use crate::state::AppState;

/// WebSocket upgrade handler.
pub async fn ws_logs(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state.require_source(&id)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, id)))
}

/// Forward log lines, one text frame each, until either side goes away.
async fn handle_socket(socket: WebSocket, state: AppState, source_id: String) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.engine.subscribe_logs(&source_id);

    let subscribers = state.engine.log_hub().subscriber_count(&source_id);
    info!(source_id = %source_id, subscribers, "Log subscriber connected");

    let send_source = source_id.clone();
    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(line) => {
                    if sender.send(Message::Text(line.render().into())).await.is_err() {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(source_id = %send_source, skipped, "Log subscriber lagging, lines dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                debug!("WebSocket client sent close frame");
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!(source_id = %source_id, "Log subscriber disconnected");
}
