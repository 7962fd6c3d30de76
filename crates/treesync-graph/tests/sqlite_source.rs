//! Full run from a SQLite file through the source registry.

use std::sync::Arc;

use rusqlite::Connection;
use treesync_core::{FileConfigStore, PropertyValue, RunStatus, SourceSettings};
use treesync_graph::{MemoryGraph, SyncEngine};
use treesync_source::SourceRegistry;

const SCHEMA: &str = r#"
CREATE TABLE UNITS (
    UNIT_ID CHAR(8), UNIT_NAME TEXT,
    DEVICE_A TEXT, DEVICE_A_NAME TEXT,
    DEVICE_B TEXT, DEVICE_B_NAME TEXT
);
CREATE TABLE DEVICES (
    ID INTEGER PRIMARY KEY, PARENT_ID INTEGER, CODE TEXT, NAME TEXT,
    ASSET_NO TEXT, TYPE_CODE TEXT, INSTALLED_AT TEXT,
    MANUFACTURER TEXT, MODEL TEXT, WEIGHT REAL
);
CREATE TABLE DEVICE_TYPES (TYPE_CODE CHAR(6), TYPE_NAME TEXT);

INSERT INTO UNITS VALUES ('U1      ', 'Line 1', 'D1', 'Main pump', 'D2', 'Fan');
INSERT INTO DEVICES VALUES (1, NULL, 'D1', 'Pump', 'A-1', 'PMP', '2021-04-01 08:00:00', 'Acme', 'P-200', 120.5);
INSERT INTO DEVICES VALUES (2, NULL, 'D2', 'Fan', 'A-2', 'FAN', NULL, 'Acme', 'F-10', NULL);
INSERT INTO DEVICES VALUES (3, 1, 'D1a', 'Motor', 'A-3', 'MTR', NULL, NULL, NULL, 40);
INSERT INTO DEVICES VALUES (4, 1, 'D1b', 'Seal', 'A-4', NULL, NULL, NULL, NULL, 0.2);
INSERT INTO DEVICES VALUES (5, 3, 'D1a-i', 'Rotor', 'A-5', 'MTR', NULL, NULL, NULL, 8);
INSERT INTO DEVICE_TYPES VALUES ('PMP   ', 'Pump');
INSERT INTO DEVICE_TYPES VALUES ('FAN', 'Fan');
INSERT INTO DEVICE_TYPES VALUES ('MTR', 'Motor');
"#;

#[tokio::test]
async fn test_sqlite_source_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("plant.db");
    Connection::open(&db_path)
        .unwrap()
        .execute_batch(SCHEMA)
        .unwrap();

    let registry = Arc::new(SourceRegistry::new(vec![SourceSettings {
        id: "plant".to_string(),
        name: "Plant".to_string(),
        path: db_path,
        sync_enabled: true,
    }]));
    let graph = MemoryGraph::new();
    let engine = SyncEngine::builder(
        Arc::new(FileConfigStore::new(dir.path().join("mappings"))),
        registry,
        Arc::new(graph.clone()),
    )
    .batch_size(3)
    .build();

    let report = engine.run("plant").await.unwrap();

    assert_eq!(graph.node_count(), 6);
    assert_eq!(graph.edge_count_of("CONTAINS"), 2);
    assert_eq!(graph.edge_count_of("CHILD"), 3);
    assert_eq!(report.warnings, 0);
    assert_eq!(engine.status("plant").status, RunStatus::Success);

    // Padded CHAR keys are trimmed before they become graph keys.
    assert!(graph.node("Unit", "U1").is_some());
    let d1 = graph.node("Device", "D1").unwrap();
    assert!(d1.has_label("Pump"));
    assert_eq!(d1.property("weight"), Some(&PropertyValue::Float(120.5)));
    assert_eq!(
        d1.property("installedAt"),
        Some(&PropertyValue::String("2021-04-01 08:00:00".into()))
    );
    assert!(graph.node("Device", "D2").unwrap().property("weight").is_none());
}
