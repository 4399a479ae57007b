//! Response wrapper for successful HTTP responses.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Wrapper for successful responses.
///
/// Mirrors `ProblemDetails` by carrying a `success` flag at the top level of
/// the body. The payload's fields are flattened next to it.
///
/// # Example
///
/// ```
/// use dangerzone_service_shared::ServiceResponse;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct ZoneList {
///     count: usize,
///     zones: Vec<String>,
/// }
///
/// let response = ServiceResponse::new(ZoneList { count: 0, zones: vec![] });
/// assert!(response.success);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceResponse<T> {
    /// Always `true` for this wrapper.
    pub success: bool,

    /// The actual response payload.
    #[serde(flatten)]
    pub data: T,
}

impl<T> ServiceResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T> From<T> for ServiceResponse<T> {
    fn from(data: T) -> Self {
        Self::new(data)
    }
}

impl<T: Serialize> IntoResponse for ServiceResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
