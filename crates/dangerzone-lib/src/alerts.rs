//! Real-time alert fan-out.
//!
//! The [`Broadcaster`] keeps an explicit registry of live connections. Each
//! connection owns a bounded queue; [`Broadcaster::publish`] walks a snapshot
//! of the registry and enqueues the event once per connection. A connection
//! whose queue is closed or full is unregistered on its own, without
//! affecting delivery to the others.
//!
//! ```text
//! peer ──alert──▶ publish_signal ─▶ normalize ─▶ publish ─┬─▶ conn 1 queue ─▶ peer 1
//!                                                          ├─▶ conn 2 queue ─▶ peer 2
//!                                                          └─▶ conn N queue ─▶ peer N
//! ```
//!
//! There is no replay: a connection registered after a publish returns never
//! sees that event.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::geometry::Point;

/// Message used when an inbound alert carries none.
pub const DEFAULT_ALERT_MESSAGE: &str = "Emergency alert";

/// Per-connection queue length before the connection counts as failed.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Alert severity. Alerts relayed by this service are always critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Critical,
}

/// Inbound alert payload as sent by a peer.
///
/// Deserialization never fails: any JSON value is accepted and fields with the
/// wrong shape are dropped during [`AlertSignal::from_value`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertSignal {
    pub message: Option<String>,
    pub location: Option<Point>,
}

impl AlertSignal {
    /// Extract whatever usable fields a raw payload carries.
    pub fn from_value(value: &Value) -> Self {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);
        let location = value
            .get("location")
            .and_then(|loc| serde_json::from_value::<Point>(loc.clone()).ok())
            .filter(Point::is_finite);
        Self { message, location }
    }
}

/// Outbound alert as delivered to every connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub message: String,
    pub location: Option<Point>,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
}

impl AlertEvent {
    /// Normalize a signal into an event stamped with the current time.
    pub fn from_signal(signal: AlertSignal) -> Self {
        Self {
            message: signal
                .message
                .unwrap_or_else(|| DEFAULT_ALERT_MESSAGE.to_string()),
            location: signal.location,
            timestamp: Utc::now(),
            severity: Severity::Critical,
        }
    }
}

/// Process-unique connection identity. Reconnecting yields a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle of a connection. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Sending half of a connection, as held by the registry.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    tx: mpsc::Sender<AlertEvent>,
}

impl Connection {
    /// Create a connection and the receiver its transport drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AlertEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                id: ConnectionId::next(),
                tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Outcome of a single publish call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Connections the event was enqueued for.
    pub delivered: usize,
    /// Connections that failed and were unregistered.
    pub dropped: usize,
}

/// Registry of live connections with fan-out delivery.
///
/// Cheap to clone; clones share the registry.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    connections: Arc<DashMap<ConnectionId, Connection>>,
    queue_capacity: usize,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl Broadcaster {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Add a connection to the live set.
    ///
    /// Returns `false` without replacing anything when the id is already
    /// registered.
    pub fn register(&self, connection: Connection) -> bool {
        match self.connections.entry(connection.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                debug!(connection = %connection.id, "connection registered");
                slot.insert(connection);
                true
            }
        }
    }

    /// Remove a connection. Safe to call repeatedly.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.connections.remove(&id).is_some();
        if removed {
            debug!(connection = %id, "connection unregistered");
        }
        removed
    }

    /// Start a new connection in the `Connecting` state.
    pub fn connect(&self) -> PendingConnection {
        let (connection, rx) = Connection::channel(self.queue_capacity);
        PendingConnection {
            broadcaster: self.clone(),
            connection,
            rx,
        }
    }

    /// Shorthand for `connect().open()`.
    pub fn subscribe(&self) -> Subscription {
        self.connect().open()
    }

    /// Deliver `event` to every connection currently registered.
    pub fn publish(&self, event: &AlertEvent) -> PublishReport {
        let targets: Vec<Connection> = self
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut report = PublishReport::default();
        for connection in targets {
            match connection.tx.try_send(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    let reason = match e {
                        mpsc::error::TrySendError::Full(_) => "queue full",
                        mpsc::error::TrySendError::Closed(_) => "peer gone",
                    };
                    warn!(connection = %connection.id, reason, "alert delivery failed, dropping connection");
                    self.unregister(connection.id);
                    report.dropped += 1;
                }
            }
        }

        debug!(
            delivered = report.delivered,
            dropped = report.dropped,
            "alert published"
        );
        report
    }

    /// Normalize an inbound signal, publish it and return the sent event.
    pub fn publish_signal(&self, signal: AlertSignal) -> (AlertEvent, PublishReport) {
        let event = AlertEvent::from_signal(signal);
        let report = self.publish(&event);
        (event, report)
    }
}

/// A connection that has not joined the live set yet.
#[derive(Debug)]
pub struct PendingConnection {
    broadcaster: Broadcaster,
    connection: Connection,
    rx: mpsc::Receiver<AlertEvent>,
}

impl PendingConnection {
    pub fn id(&self) -> ConnectionId {
        self.connection.id
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::Connecting
    }

    /// Register with the broadcaster and start receiving events.
    pub fn open(self) -> Subscription {
        let id = self.connection.id;
        self.broadcaster.register(self.connection);
        Subscription {
            id,
            broadcaster: self.broadcaster,
            rx: self.rx,
        }
    }
}

/// Receiving side of an open connection.
///
/// Dropping the subscription unregisters the connection.
#[derive(Debug)]
pub struct Subscription {
    id: ConnectionId,
    broadcaster: Broadcaster,
    rx: mpsc::Receiver<AlertEvent>,
}

impl Subscription {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        if self.broadcaster.is_registered(self.id) {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the connection was unregistered and its queue is
    /// drained.
    pub async fn recv(&mut self) -> Option<AlertEvent> {
        self.rx.recv().await
    }

    /// Take an already queued event without waiting.
    pub fn try_recv(&mut self) -> Option<AlertEvent> {
        self.rx.try_recv().ok()
    }

    /// Unregister now; the subscription stays usable for draining.
    pub fn close(&mut self) {
        self.broadcaster.unregister(self.id);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broadcaster.unregister(self.id);
    }
}
