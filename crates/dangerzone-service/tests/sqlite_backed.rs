//! The HTTP surface over the SQLite backend, including reopening the file.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{relaxed_limiter, server_for};
use dangerzone_lib::{SqliteBackend, StoreConfig, ZoneStore};
use dangerzone_service_shared::test_utils::{create_zone_body, square_geometry, test_state_with_store};
use dangerzone_service_shared::Environment;
use serde_json::{json, Value};

async fn sqlite_server(path: &std::path::Path) -> axum_test::TestServer {
    let backend = SqliteBackend::open(path).await.unwrap();
    let store = ZoneStore::new(Arc::new(backend), StoreConfig::default());
    server_for(
        test_state_with_store(store, Environment::Development),
        relaxed_limiter(),
    )
}

#[tokio::test]
async fn zones_survive_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zones.db");

    let first = sqlite_server(&path).await;
    let response = first
        .post("/api/zones")
        .json(&create_zone_body("Zone A", square_geometry(0.0, 0.0, 1.0)))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created: Value = response.json();

    let health: Value = first.get("/health").await.json();
    assert_eq!(health["database"], "connected");
    drop(first);

    let second = sqlite_server(&path).await;
    let check: Value = second
        .post("/api/zones/check")
        .json(&json!({"lat": 0.5, "lng": 0.5}))
        .await
        .json();
    assert_eq!(check["isInDangerZone"], true);
    assert_eq!(check["dangerousZones"][0]["id"], created["zone"]["id"]);

    let id = created["zone"]["id"].as_str().unwrap();
    second
        .delete(&format!("/api/zones/{id}"))
        .await
        .assert_status_ok();

    let list: Value = second.get("/api/zones").await.json();
    assert_eq!(list["count"], 0);
}
