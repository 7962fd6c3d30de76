//! treesync web server
//!
//! Axum HTTP API to trigger runs, read their status, edit mapping
//! configurations and toggle scheduled sync, plus a WebSocket log stream.

pub mod routes;
pub mod state;
pub mod websocket;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/sources", get(routes::sources::list_sources))
        .route(
            "/sync/mapping/{id}",
            get(routes::sync::get_mapping).post(routes::sync::save_mapping),
        )
        .route("/sync/trigger/{id}", post(routes::sync::trigger_sync))
        .route("/sync/status/{id}", get(routes::sync::get_status))
        .route("/sync/toggle/{id}", post(routes::sources::toggle_sync))
        .with_state(state.clone());

    Router::new()
        .nest("/api", api_routes)
        .route("/ws/logs/{id}", get(websocket::ws_logs))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run the web server.
pub async fn run_server(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Web server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
