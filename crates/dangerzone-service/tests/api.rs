//! HTTP contract tests for the zone API, health probes and rate limiting.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use common::{broken_server, relaxed_limiter, server, server_for};
use dangerzone_service_shared::test_utils::{create_zone_body, square_geometry, test_state};
use dangerzone_service_shared::{Environment, ManualClock, RateLimitConfig, RateLimiter};
use serde_json::{json, Value};

async fn create(server: &axum_test::TestServer, name: &str, geometry: Value) -> Value {
    let response = server
        .post("/api/zones")
        .json(&create_zone_body(name, geometry))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    body["zone"].clone()
}

#[tokio::test]
async fn create_returns_201_with_zone() {
    let server = server();
    let response = server
        .post("/api/zones")
        .json(&json!({
            "name": "  Zone A ",
            "geometry": square_geometry(0.0, 0.0, 1.0),
            "properties": {"level": "high"}
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["zone"]["name"], "Zone A");
    assert_eq!(body["zone"]["geometry"]["type"], "Polygon");
    assert_eq!(body["zone"]["properties"]["level"], "high");
    assert!(body["zone"]["id"].is_string());
    assert_eq!(body["zone"]["createdAt"], body["zone"]["updatedAt"]);
}

#[tokio::test]
async fn create_rejects_open_ring_and_missing_fields() {
    let server = server();

    let open = json!({
        "name": "Open",
        "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1]]]}
    });
    let response = server.post("/api/zones").json(&open).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["type"], "/problems/invalid-request");

    server
        .post("/api/zones")
        .json(&json!({"geometry": square_geometry(0.0, 0.0, 1.0)}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .post("/api/zones")
        .json(&json!({"name": "No geometry"}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let off_the_map = json!({
        "name": "Nowhere",
        "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [500, 95], [1, 1], [0, 0]]]}
    });
    let response = server.post("/api/zones").json(&off_the_map).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["detail"].as_str().unwrap().contains("out of range"));

    let list: Value = server.get("/api/zones").await.json();
    assert_eq!(list["count"], 0);
}

#[tokio::test]
async fn create_rejects_malformed_json_as_problem() {
    let server = server();
    let response = server
        .post("/api/zones")
        .content_type("application/json")
        .text("{not json")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn list_returns_count_and_zones() {
    let server = server();
    create(&server, "A", square_geometry(0.0, 0.0, 1.0)).await;
    create(&server, "B", square_geometry(3.0, 3.0, 1.0)).await;

    let response = server.get("/api/zones").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 2);
    assert_eq!(body["zones"][0]["name"], "A");
    assert_eq!(body["zones"][1]["name"], "B");
}

#[tokio::test]
async fn check_reports_danger_and_safety() {
    let server = server();
    let zone = create(&server, "Zone A", square_geometry(0.0, 0.0, 1.0)).await;

    let inside: Value = server
        .post("/api/zones/check")
        .json(&json!({"lat": 0.5, "lng": 0.5}))
        .await
        .json();
    assert_eq!(inside["success"], true);
    assert_eq!(inside["isInDangerZone"], true);
    assert_eq!(inside["dangerousZones"][0]["id"], zone["id"]);
    assert_eq!(
        inside["message"],
        "Warning: location is inside 1 danger zone(s)"
    );

    let outside: Value = server
        .post("/api/zones/check")
        .json(&json!({"lat": 5, "lng": 5}))
        .await
        .json();
    assert_eq!(outside["isInDangerZone"], false);
    assert_eq!(outside["dangerousZones"], json!([]));
    assert_eq!(outside["message"], "Location is safe");
}

#[tokio::test]
async fn check_rejects_missing_or_non_numeric_coordinates() {
    let server = server();
    server
        .post("/api/zones/check")
        .json(&json!({"lat": 1}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .post("/api/zones/check")
        .json(&json!({"lat": "north", "lng": 1}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn nearby_orders_by_distance_and_validates() {
    let server = server();
    let far = create(&server, "Far", square_geometry(0.03, -0.005, 0.01)).await;
    let near = create(&server, "Near", square_geometry(0.01, -0.005, 0.01)).await;
    create(&server, "Remote", square_geometry(10.0, 10.0, 1.0)).await;

    let response = server
        .get("/api/zones/nearby")
        .add_query_param("lat", 0)
        .add_query_param("lng", 0)
        .add_query_param("maxDistance", 10000)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["count"], 2);
    assert_eq!(body["zones"][0]["id"], near["id"]);
    assert_eq!(body["zones"][1]["id"], far["id"]);

    server
        .get("/api/zones/nearby")
        .add_query_param("lat", 0)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .get("/api/zones/nearby")
        .add_query_param("lat", "abc")
        .add_query_param("lng", 0)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn within_is_inclusive_and_requires_all_edges() {
    let server = server();
    let inside = create(&server, "Inside", square_geometry(0.5, 0.5, 1.0)).await;
    create(&server, "Far", square_geometry(10.0, 10.0, 1.0)).await;

    let response = server
        .get("/api/zones/within")
        .add_query_param("minLat", 0)
        .add_query_param("minLng", 0)
        .add_query_param("maxLat", 2)
        .add_query_param("maxLng", 2)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["zones"][0]["id"], inside["id"]);

    server
        .get("/api/zones/within")
        .add_query_param("minLat", 0)
        .add_query_param("minLng", 0)
        .add_query_param("maxLat", 2)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_and_delete_by_id() {
    let server = server();
    let zone = create(&server, "Temp", square_geometry(0.0, 0.0, 1.0)).await;
    let path = format!("/api/zones/{}", zone["id"].as_str().unwrap());

    let fetched: Value = server.get(&path).await.json();
    assert_eq!(fetched["zone"], zone);

    let response = server.delete(&path).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Zone deleted successfully");
    assert_eq!(body["zone"], zone);

    let again = server.delete(&path).await;
    again.assert_status(StatusCode::NOT_FOUND);
    let problem: Value = again.json();
    assert_eq!(problem["type"], "/problems/zone-not-found");

    server.get(&path).await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_id_is_bad_request() {
    let server = server();
    server
        .delete("/api/zones/64f1c0ffee")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .get("/api/zones/not-an-id")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_connected_store() {
    let server = server();

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
    assert!(body["uptimeSeconds"].as_f64().unwrap() >= 0.0);
    assert!(body["timestamp"].is_string());

    server.get("/health/live").await.assert_status_ok();
}

#[tokio::test]
async fn health_is_503_when_store_is_broken() {
    let server = broken_server(Environment::Development);
    let response = server.get("/health").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["database"], "error");
    assert_eq!(body["status"], "degraded");

    server.get("/health/live").await.assert_status_ok();
}

#[tokio::test]
async fn internal_errors_are_redacted_in_production() {
    let dev = broken_server(Environment::Development);
    let response = dev.get("/api/zones").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert!(body["detail"].as_str().unwrap().contains("checksum"));

    let prod = broken_server(Environment::Production);
    let response = prod.get("/api/zones").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(!body["detail"].as_str().unwrap().contains("checksum"));
}

#[tokio::test]
async fn responses_carry_request_id() {
    let server = server();
    let response = server
        .get("/api/zones/not-an-id")
        .add_header(
            axum::http::HeaderName::from_static("x-request-id"),
            axum::http::HeaderValue::from_static("req-42"),
        )
        .await;
    let body: Value = response.json();
    assert_eq!(body["instance"], "req-42");
    assert_eq!(
        response.header(axum::http::HeaderName::from_static("x-request-id")),
        "req-42"
    );
}

#[tokio::test]
async fn api_is_rate_limited_but_health_is_not() {
    let clock = Arc::new(ManualClock::new());
    let limiter = RateLimiter::new(
        RateLimitConfig {
            max_requests: 2,
            window: Duration::from_secs(60),
        },
        clock.clone(),
    );
    let server = server_for(test_state(), limiter);

    server.get("/api/zones").await.assert_status_ok();
    server.get("/api/zones").await.assert_status_ok();

    let limited = server.get("/api/zones").await;
    limited.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let body: Value = limited.json();
    assert_eq!(body["type"], "/problems/rate-limited");

    server.get("/health/live").await.assert_status_ok();

    clock.advance(Duration::from_secs(60));
    server.get("/api/zones").await.assert_status_ok();
}

#[tokio::test]
async fn metrics_endpoint_responds() {
    let server = common::server_for(test_state(), relaxed_limiter());
    server.get("/metrics").await.assert_status_ok();
}
