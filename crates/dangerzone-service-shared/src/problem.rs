//! RFC 9457 Problem Details for HTTP APIs.
//!
//! Every error leaving the service is a problem document with an extra
//! `success: false` member so clients can branch on one field for both
//! success and failure bodies.
//! See: <https://www.rfc-editor.org/rfc/rfc9457.html>

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use dangerzone_lib::{Error as LibError, ErrorKind};

use crate::config::Environment;

/// Problem type URI for invalid request bodies or parameters.
pub const PROBLEM_INVALID_REQUEST: &str = "/problems/invalid-request";

/// Problem type URI for zones that do not exist.
pub const PROBLEM_ZONE_NOT_FOUND: &str = "/problems/zone-not-found";

/// Problem type URI for clients over their request budget.
pub const PROBLEM_RATE_LIMITED: &str = "/problems/rate-limited";

/// Problem type URI for internal server errors.
pub const PROBLEM_INTERNAL_ERROR: &str = "/problems/internal-error";

/// Problem type URI for an unreachable storage backend.
pub const PROBLEM_SERVICE_UNAVAILABLE: &str = "/problems/service-unavailable";

/// Detail shown for internal errors when running in production mode.
pub const REDACTED_DETAIL: &str = "An unexpected error occurred";

/// RFC 9457 Problem Details response structure.
///
/// # Example
///
/// ```
/// use dangerzone_service_shared::{ProblemDetails, PROBLEM_ZONE_NOT_FOUND};
/// use axum::http::StatusCode;
///
/// let problem = ProblemDetails::new(
///     PROBLEM_ZONE_NOT_FOUND,
///     "Zone Not Found",
///     StatusCode::NOT_FOUND,
/// )
/// .with_detail("zone 0190c5d2-0000-7000-8000-000000000000 not found")
/// .with_request_id("req-12345");
/// assert!(!problem.success);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// Always `false` for problem responses.
    pub success: bool,

    /// URI reference identifying the problem type (relative).
    #[serde(rename = "type")]
    pub type_uri: String,

    /// Short, human-readable summary of the problem.
    pub title: String,

    /// HTTP status code for this problem.
    pub status: u16,

    /// Human-readable explanation specific to this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Request identifier of the failing request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl ProblemDetails {
    pub fn new(type_uri: impl Into<String>, title: impl Into<String>, status: StatusCode) -> Self {
        Self {
            success: false,
            type_uri: type_uri.into(),
            title: title.into(),
            status: status.as_u16(),
            detail: None,
            instance: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.instance = Some(request_id.into());
        self
    }

    /// 400 Bad Request for invalid input.
    pub fn bad_request(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_INVALID_REQUEST,
            "Invalid Request",
            StatusCode::BAD_REQUEST,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }

    /// 404 Not Found for an unknown zone id.
    pub fn zone_not_found(id: &str, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_ZONE_NOT_FOUND,
            "Zone Not Found",
            StatusCode::NOT_FOUND,
        )
        .with_detail(format!("Zone '{}' not found", id))
        .with_request_id(request_id)
    }

    /// 429 Too Many Requests.
    pub fn too_many_requests(retry_after_secs: u64, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_RATE_LIMITED,
            "Too Many Requests",
            StatusCode::TOO_MANY_REQUESTS,
        )
        .with_detail(format!(
            "Too many requests, please try again in {} seconds",
            retry_after_secs
        ))
        .with_request_id(request_id)
    }

    /// 500 Internal Server Error.
    pub fn internal_error(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_INTERNAL_ERROR,
            "Internal Error",
            StatusCode::INTERNAL_SERVER_ERROR,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }

    /// 503 Service Unavailable.
    pub fn service_unavailable(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_SERVICE_UNAVAILABLE,
            "Service Unavailable",
            StatusCode::SERVICE_UNAVAILABLE,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }
}

impl std::fmt::Display for ProblemDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.title,
            self.detail.as_deref().unwrap_or("")
        )
    }
}

impl std::error::Error for ProblemDetails {}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut response = Json(&self).into_response();
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );

        *response.status_mut() = status;
        response
    }
}

impl IntoResponse for Box<ProblemDetails> {
    fn into_response(self) -> Response {
        (*self).into_response()
    }
}

/// Convert library errors to ProblemDetails.
///
/// Validation and not-found messages are surfaced verbatim. Internal failures
/// are logged with their full detail and, in production, replaced with
/// [`REDACTED_DETAIL`] in the response body.
pub fn from_lib_error(error: &LibError, request_id: &str, environment: Environment) -> ProblemDetails {
    match error.kind() {
        ErrorKind::Validation | ErrorKind::InvalidArgument => {
            ProblemDetails::bad_request(error.to_string(), request_id)
        }
        ErrorKind::NotFound => match error {
            LibError::NotFound { id } => ProblemDetails::zone_not_found(id, request_id),
            other => ProblemDetails::new(
                PROBLEM_ZONE_NOT_FOUND,
                "Zone Not Found",
                StatusCode::NOT_FOUND,
            )
            .with_detail(other.to_string())
            .with_request_id(request_id),
        },
        ErrorKind::Unavailable => {
            tracing::warn!(request_id, error = %error, "storage backend unavailable");
            ProblemDetails::service_unavailable(error.to_string(), request_id)
        }
        ErrorKind::Internal => {
            tracing::error!(request_id, error = %error, "internal error");
            if environment.is_production() {
                ProblemDetails::internal_error(REDACTED_DETAIL, request_id)
            } else {
                ProblemDetails::internal_error(error.to_string(), request_id)
            }
        }
    }
}
