//! Alert fan-out over real WebSocket connections.

mod common;

use axum_test::TestServer;
use common::relaxed_limiter;
use dangerzone_lib::alerts::DEFAULT_ALERT_MESSAGE;
use dangerzone_service::{router, RouterConfig};
use dangerzone_service_shared::test_utils::test_state;
use serde_json::{json, Value};

fn ws_server() -> TestServer {
    let app = router(test_state(), relaxed_limiter(), &RouterConfig::default());
    TestServer::builder()
        .http_transport()
        .build(app)
        .expect("ws test server")
}

#[tokio::test]
async fn alert_reaches_every_connection_including_sender() {
    let server = ws_server();
    let mut sender = server.get_websocket("/ws").await.into_websocket().await;
    let mut listener = server.get_websocket("/ws").await.into_websocket().await;

    sender
        .send_json(&json!({
            "event": "alert",
            "data": {"message": "test", "location": {"lat": 1, "lng": 1}}
        }))
        .await;

    for socket in [&mut listener, &mut sender] {
        let frame: Value = socket.receive_json().await;
        assert_eq!(frame["event"], "alert");
        assert_eq!(frame["data"]["message"], "test");
        assert_eq!(frame["data"]["severity"], "critical");
        assert_eq!(frame["data"]["location"]["lat"], 1.0);
        assert!(frame["data"]["timestamp"].is_string());
    }
}

#[tokio::test]
async fn non_alert_frames_are_ignored() {
    let server = ws_server();
    let mut sender = server.get_websocket("/ws").await.into_websocket().await;
    let mut listener = server.get_websocket("/ws").await.into_websocket().await;

    sender.send_text("not json").await;
    sender
        .send_json(&json!({"event": "chat", "data": {"message": "hi"}}))
        .await;
    sender.send_json(&json!({"event": "alert"})).await;

    // The only frame delivered is the alert, filled with defaults.
    let frame: Value = listener.receive_json().await;
    assert_eq!(frame["event"], "alert");
    assert_eq!(frame["data"]["message"], DEFAULT_ALERT_MESSAGE);
    assert!(frame["data"]["location"].is_null());
}
