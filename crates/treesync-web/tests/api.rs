//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use async_trait::async_trait;
use tokio::sync::Notify;
use tower::ServiceExt;
use treesync_core::{MemoryConfigStore, Row, RunStatus, SourceSettings, SyncRun, DEFAULT_MAPPING};
use treesync_graph::{MemoryGraph, SyncEngine};
use treesync_source::{
    MemoryConnector, MemoryReader, RelationalReader, SourceConnector, SourceRegistry, SourceResult,
};
use treesync_web::{create_router, AppState};

/// Holds every run at "Connecting to source" until the gate opens.
struct GatedConnector {
    gate: Arc<Notify>,
    inner: MemoryConnector,
}

#[async_trait]
impl SourceConnector for GatedConnector {
    async fn connect(&self, source_id: &str) -> SourceResult<Arc<dyn RelationalReader>> {
        self.gate.notified().await;
        self.inner.connect(source_id).await
    }
}

struct Fixture {
    router: Router,
    engine: SyncEngine,
    graph: MemoryGraph,
    gate: Arc<Notify>,
}

fn fixture() -> Fixture {
    let reader = MemoryReader::new()
        .with_table(
            "UNITS",
            vec![Row::new()
                .with("UNIT_ID", "U1")
                .with("DEVICE_A", "D1")
                .with("DEVICE_B", "D2")],
        )
        .with_table(
            "DEVICES",
            vec![
                Row::new().with("CODE", "D1").with("ID", 1),
                Row::new().with("CODE", "D2").with("ID", 2),
                Row::new().with("CODE", "D1a").with("ID", 3).with("PARENT_ID", 1),
            ],
        )
        .with_table("DEVICE_TYPES", vec![]);
    let graph = MemoryGraph::new();
    let gate = Arc::new(Notify::new());
    let connector = GatedConnector {
        gate: Arc::clone(&gate),
        inner: MemoryConnector::new().with_source("plant", reader),
    };
    let engine = SyncEngine::builder(
        Arc::new(MemoryConfigStore::new()),
        Arc::new(connector),
        Arc::new(graph.clone()),
    )
    .build();
    let registry = Arc::new(SourceRegistry::new(vec![SourceSettings {
        id: "plant".to_string(),
        name: "Plant".to_string(),
        path: "plant.db".into(),
        sync_enabled: false,
    }]));
    Fixture {
        router: create_router(AppState::new(engine.clone(), registry)),
        engine,
        graph,
        gate,
    }
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: impl Into<Body>, content_type: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", content_type)
        .body(body.into())
        .unwrap()
}

async fn wait_idle(engine: &SyncEngine) {
    for _ in 0..500 {
        if !engine.is_running("plant") {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("run did not finish");
}

#[tokio::test]
async fn test_list_sources() {
    let router = fixture().router;
    let response = router.oneshot(get("/api/sources")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let sources: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(sources[0]["id"], "plant");
    assert_eq!(sources[0]["sync_enabled"], false);
    assert_eq!(sources[0]["status"], "idle");
}

#[tokio::test]
async fn test_trigger_then_conflict_then_status() {
    let Fixture {
        router,
        engine,
        graph,
        gate,
    } = fixture();

    let response = router
        .clone()
        .oneshot(post("/api/sync/trigger/plant", Body::empty(), "text/plain"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = router
        .clone()
        .oneshot(post("/api/sync/trigger/plant", Body::empty(), "text/plain"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    gate.notify_one();
    wait_idle(&engine).await;
    let response = router.oneshot(get("/api/sync/status/plant")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let run: SyncRun = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.history.len(), 1);
    assert_eq!(graph.node_count(), 4);
}

#[tokio::test]
async fn test_unknown_source_is_404() {
    let router = fixture().router;
    let response = router
        .clone()
        .oneshot(post("/api/sync/trigger/nope", Body::empty(), "text/plain"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router.oneshot(get("/api/sync/status/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_mapping_get_and_validated_save() {
    let router = fixture().router;

    let response = router
        .clone()
        .oneshot(get("/api/sync/mapping/plant"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, DEFAULT_MAPPING);

    let response = router
        .clone()
        .oneshot(post("/api/sync/mapping/plant", "[nodes", "application/toml"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let edited = DEFAULT_MAPPING.replace("type = \"CHILD\"", "type = \"PART_OF\"");
    let response = router
        .clone()
        .oneshot(post("/api/sync/mapping/plant", edited.clone(), "application/toml"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router.oneshot(get("/api/sync/mapping/plant")).await.unwrap();
    assert_eq!(body_text(response).await, edited);
}

#[tokio::test]
async fn test_toggle() {
    let router = fixture().router;

    let response = router
        .clone()
        .oneshot(post(
            "/api/sync/toggle/plant",
            r#"{"enabled": true}"#,
            "application/json",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let source: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(source["sync_enabled"], true);

    let response = router
        .oneshot(post(
            "/api/sync/toggle/ghost",
            r#"{"enabled": true}"#,
            "application/json",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
