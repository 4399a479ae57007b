//! Real-time alert channel on `/ws`.
//!
//! Protocol (text frames, JSON):
//! - peer -> server: `{"event":"alert","data":{"message"?,"location"?}}`
//! - server -> peers: `{"event":"alert","data":{"message","location","timestamp","severity"}}`
//!
//! Every open connection, including the sender, receives each broadcast.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Duration;

use dangerzone_lib::{AlertEvent, AlertSignal, Subscription};
use dangerzone_service_shared::{record_alert_broadcast, record_ws_connections, AppState};

/// Interval between server pings.
pub const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Event name carried by alert frames in both directions.
pub const ALERT_EVENT: &str = "alert";

#[derive(Debug, Deserialize)]
struct InboundFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Serialize)]
struct OutboundFrame<'a> {
    event: &'static str,
    data: &'a AlertEvent,
}

/// Parse an inbound text frame. `None` for anything that is not an alert.
pub fn parse_alert_frame(text: &str) -> Option<AlertSignal> {
    let frame: InboundFrame = serde_json::from_str(text).ok()?;
    (frame.event == ALERT_EVENT).then(|| AlertSignal::from_value(&frame.data))
}

/// Encode an event as an outbound alert frame.
pub fn encode_alert_frame(event: &AlertEvent) -> serde_json::Result<String> {
    serde_json::to_string(&OutboundFrame {
        event: ALERT_EVENT,
        data: event,
    })
}

/// `GET /ws`
///
/// The connection joins the live set before the handshake response is sent,
/// so a client that sees the upgrade complete also sees later broadcasts. If
/// the upgrade fails the subscription is dropped and unregisters itself.
pub async fn alerts_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let pending = state.broadcaster().connect();
    tracing::debug!(connection = %pending.id(), "alert channel upgrade requested");
    let subscription = pending.open();
    ws.on_upgrade(move |socket| alert_session(socket, state, subscription))
}

async fn alert_session(socket: WebSocket, state: AppState, mut subscription: Subscription) {
    let connection = subscription.id();
    let (mut sink, mut stream) = socket.split();

    record_ws_connections(1);
    tracing::info!(
        connection = %connection,
        live = state.broadcaster().len(),
        "alert channel connected"
    );

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }

            event = subscription.recv() => {
                let Some(event) = event else {
                    tracing::debug!(connection = %connection, "alert queue closed");
                    break;
                };
                let text = match encode_alert_frame(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(connection = %connection, error = %e, "failed to encode alert");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match parse_alert_frame(text.as_str()) {
                        Some(signal) => {
                            let (event, report) = state.broadcaster().publish_signal(signal);
                            record_alert_broadcast(report.delivered, report.dropped);
                            tracing::info!(
                                connection = %connection,
                                message = %event.message,
                                delivered = report.delivered,
                                dropped = report.dropped,
                                "alert broadcast"
                            );
                        }
                        None => {
                            tracing::debug!(connection = %connection, "ignoring non-alert frame");
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(connection = %connection, error = %e, "alert channel transport error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    subscription.close();
    record_ws_connections(-1);
    tracing::info!(connection = %connection, "alert channel disconnected");
}
