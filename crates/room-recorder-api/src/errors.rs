//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use room_recorder_core::{AuthError, ParseError};
use tracing::warn;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Webhook handler errors with HTTP status code mapping
///
/// - `401 Unauthorized`: the delivery could not be authenticated; nothing
///   else about it was examined
/// - `400 Bad Request`: the authenticated payload is not a usable event
///
/// Egress failures are not handler errors. The delivery is acknowledged
/// with `200` and the failure is logged.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// Missing, malformed or unverifiable authorization token
    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    /// Payload is not JSON, has a non-string event tag, or a `room_started`
    /// event lacks its room
    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] ParseError),
}

impl WebhookHandlerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::MalformedPayload(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::Unauthorized(e) => {
                warn!(error = %e, "Rejecting unauthenticated webhook");
                // Verification details stay in the log
                "Unauthorized".to_string()
            }
            Self::MalformedPayload(e) => {
                warn!(error = %e, "Rejecting malformed webhook payload");
                self.to_string()
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        (status, Json(body)).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },
}
