//! Error types for the relay's HTTP routes.
//!
//! [`ApiError`] converts into a JSON response `{error, status}` via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tempo_core::HubError;

/// Errors that can occur while serving an HTTP request.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The session hub has exited (shutdown in progress).
    #[error("relay unavailable: {0}")]
    HubUnavailable(#[from] HubError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::HubUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
