//! Shared HTTP infrastructure for the danger zone service.
//!
//! - [`AppState`]: zone store, alert broadcaster and start time shared by handlers
//! - [`ServiceConfig`]: environment-driven configuration
//! - [`health`]: `/health` and `/health/live` handlers
//! - [`ProblemDetails`]: RFC 9457 Problem Details for error responses
//! - [`ServiceResponse`]: `success: true` wrapper for successful responses
//! - [`metrics`]: Prometheus metrics infrastructure
//! - [`logging`]: Structured JSON logging setup
//! - [`middleware`]: Request ids and HTTP metrics
//! - [`rate_limit`]: Fixed-window rate limiting with an injected clock
//! - Request types with validation for each endpoint
//!
//! # Architecture
//!
//! Handlers stay thin; all zone and alert logic lives in `dangerzone-lib`:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  axum Handler                                               │
//! │  - Capture query / JSON body loosely                        │
//! │  - Validate into library types                              │
//! │  - Call dangerzone-lib APIs                                 │
//! │  - Format response or problem                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Testing Support
//!
//! The [`test_utils`] module provides in-memory state and request fixtures.
//! Enable the `test-utils` feature to access it from dependent crates.

#![deny(warnings)]

pub mod config;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;
mod problem;
pub mod rate_limit;
mod request;
mod response;
mod state;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{Environment, RateLimitConfig, ServiceConfig, StorageTarget};
pub use health::{health_check, health_live, HealthStatus};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{
    init_metrics, metrics_handler, record_alert_broadcast, record_ws_connections,
    record_zone_created, record_zone_deleted, record_zone_query, MetricsConfig, MetricsError,
};
pub use middleware::{extract_or_generate_request_id, MetricsLayer, RequestId};
pub use problem::{
    from_lib_error, ProblemDetails, PROBLEM_INTERNAL_ERROR, PROBLEM_INVALID_REQUEST,
    PROBLEM_RATE_LIMITED, PROBLEM_SERVICE_UNAVAILABLE, PROBLEM_ZONE_NOT_FOUND, REDACTED_DETAIL,
};
pub use rate_limit::{Clock, ManualClock, RateLimiter, SystemClock};
pub use request::{CheckPointRequest, CreateZoneRequest, NearbyQuery, Validate, WithinQuery};
pub use response::ServiceResponse;
pub use state::AppState;
