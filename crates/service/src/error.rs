//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use messaging::PublishError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// The inbound record could not be handed to the broker.
    Publish(PublishError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Publish(err) => publish_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn publish_error_to_response(err: PublishError) -> (StatusCode, String) {
    match &err {
        PublishError::Unavailable(_) | PublishError::Timeout { .. } => {
            tracing::warn!(error = %err, "broker unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
        PublishError::Rejected { .. } | PublishError::Serialization(_) => {
            tracing::error!(error = %err, "publish failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<PublishError> for ApiError {
    fn from(err: PublishError) -> Self {
        ApiError::Publish(err)
    }
}
