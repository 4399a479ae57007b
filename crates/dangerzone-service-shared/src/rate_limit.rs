//! Fixed-window request rate limiting per client.
//!
//! The limiter takes its notion of time from an injected [`Clock`] and never
//! evicts on its own; the owner calls [`RateLimiter::evict_expired`]
//! periodically (see [`spawn_eviction`]).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::middleware::RequestId;
use crate::ProblemDetails;

/// Source of monotonic time for the limiter.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Wall clock used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset_ms: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_ms: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// Per-client fixed-window counter.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<DashMap<String, Window>>,
    clock: Arc<dyn Clock>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            clock,
            config,
        }
    }

    pub fn with_system_clock(config: RateLimitConfig) -> Self {
        Self::new(config, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Count one request for `client` and decide whether it may proceed.
    pub fn check(&self, client: &str) -> Decision {
        let now = self.clock.now();
        let window_len = self.config.window;

        let mut entry = self.windows.entry(client.to_owned()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= window_len {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.config.max_requests {
            let retry_after = window_len.saturating_sub(now.duration_since(entry.started));
            return Decision::Limited { retry_after };
        }

        entry.count += 1;
        Decision::Allowed {
            remaining: self.config.max_requests - entry.count,
        }
    }

    /// Drop windows that ended before `now`. Returns how many were removed.
    pub fn evict_expired(&self, now: Instant) -> usize {
        let before = self.windows.len();
        let window_len = self.config.window;
        self.windows
            .retain(|_, w| now.duration_since(w.started) < window_len);
        before.saturating_sub(self.windows.len())
    }

    /// [`evict_expired`](Self::evict_expired) at the limiter's own clock.
    pub fn evict_now(&self) -> usize {
        self.evict_expired(self.clock.now())
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("tracked_clients", &self.windows.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Run [`RateLimiter::evict_now`] every `every` until the task is aborted.
pub fn spawn_eviction(limiter: RateLimiter, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = limiter.evict_now();
            if removed > 0 {
                tracing::debug!(removed, "evicted expired rate limit windows");
            }
        }
    })
}

/// Client key: first `X-Forwarded-For` entry, then the peer address.
fn client_key(request: &Request) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_owned();
    }

    request
        .extensions()
        .get::<ConnectInfo<std::net::SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

/// Axum middleware; install with `axum::middleware::from_fn_with_state`.
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);
    match limiter.check(&client) {
        Decision::Allowed { .. } => next.run(request).await,
        Decision::Limited { retry_after } => {
            let request_id = request
                .extensions()
                .get::<RequestId>()
                .map(|id| id.to_string())
                .unwrap_or_default();
            let secs = retry_after.as_secs().max(1);
            tracing::warn!(client = %client, retry_after_secs = secs, "rate limit exceeded");

            let mut response =
                ProblemDetails::too_many_requests(secs, request_id).into_response();
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
            response
        }
    }
}
