//! # Room-Recorder HTTP Service
//!
//! HTTP server receiving LiveKit webhooks and starting room recordings.
//!
//! This service provides:
//! - `POST /webhook-receiver`: authenticated LiveKit webhook endpoint
//! - `GET /health`: liveness probe
//!
//! Deliveries are authenticated before anything else is read. Authenticated
//! `room_started` events trigger one egress request; every other event is
//! acknowledged and ignored.

pub mod egress_client;
pub mod errors;

pub use egress_client::TwirpEgressClient;
pub use errors::{ServiceError, WebhookHandlerError};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    middleware,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use room_recorder_core::{
    Configuration, DispatchOutcome, EgressClient, RecordingDispatcher, WebhookAuthenticator,
};
use serde::Serialize;
use std::{net::SocketAddr, sync::Arc};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn, Instrument};

/// Route LiveKit is configured to deliver webhooks to
pub const WEBHOOK_PATH: &str = "/webhook-receiver";

/// Header carrying the request correlation id
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Resolved service configuration
    pub config: Arc<Configuration>,

    /// Verifies webhook deliveries
    pub authenticator: Arc<dyn WebhookAuthenticator>,

    /// Turns authenticated deliveries into recordings
    pub dispatcher: RecordingDispatcher,
}

impl AppState {
    pub fn new(
        config: Arc<Configuration>,
        authenticator: Arc<dyn WebhookAuthenticator>,
        egress: Arc<dyn EgressClient>,
    ) -> Self {
        let dispatcher = RecordingDispatcher::new(config.clone(), egress);
        Self {
            config,
            authenticator,
            dispatcher,
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, post(handle_webhook))
        .route("/health", get(handle_health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_logging_middleware))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server on `0.0.0.0:<listen_port>` and run until SIGINT/SIGTERM
pub async fn start_server(state: AppState) -> Result<(), ServiceError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.listen_port));
    let app = create_router(state);

    let listener =
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: addr.to_string(),
                message: e.to_string(),
            })?;

    info!("Starting HTTP server on {}", addr);

    // In-flight requests, including pending egress calls, finish before exit
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

// ============================================================================
// Webhook Handler
// ============================================================================

/// Handle a LiveKit webhook delivery
///
/// 1. Authenticate the raw body against the `Authorization` token (401)
/// 2. Filter on the event tag; anything but `room_started` is acknowledged
/// 3. Parse the room and start a recording (400 if the event is unusable)
///
/// The dispatch runs on its own task and is awaited so its result can be
/// logged. It completes even if the client disconnects, and its outcome
/// never changes the status code.
#[instrument(skip(state, headers, body), fields(body_len = body.len()))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, WebhookHandlerError> {
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());

    state
        .authenticator
        .authenticate(authorization, &body)
        .await?;

    // The dispatch owns its task; a dropped connection must not cancel the
    // egress call half way.
    let dispatcher = state.dispatcher.clone();
    let dispatch =
        tokio::spawn(async move { dispatcher.dispatch(&body).await }.in_current_span());
    let outcome = match dispatch.await {
        Ok(result) => result?,
        Err(e) => {
            error!(error = %e, "Recording dispatch task did not complete");
            DispatchOutcome::Failed {
                room: String::new(),
                error: e.to_string(),
            }
        }
    };
    if let DispatchOutcome::Failed { room, error } = &outcome {
        warn!(room = %room, error = %error, "Acknowledging webhook despite egress failure");
    }

    Ok(Json(WebhookResponse::from(outcome)))
}

// ============================================================================
// Health Check Handler
// ============================================================================

#[instrument(skip(state))]
async fn handle_health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: state.config.storage.provider().to_string(),
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware with correlation ID tracking
///
/// Reuses an inbound `x-correlation-id` or generates one, records it on the
/// request span and echoes it on the response. Method and URI are span
/// fields, so the completion event only adds status and latency.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    uri = %request.uri(),
    correlation_id
))]
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let start = std::time::Instant::now();

    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());
    request.extensions_mut().insert(correlation_id.clone());

    let mut response = next.run(request).await;
    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert(CORRELATION_ID_HEADER, header_value);
    }

    let status = response.status();
    let duration_ms = start.elapsed().as_millis() as u64;
    if status.is_server_error() {
        error!(%status, duration_ms, "Request completed with server error");
    } else if status.is_client_error() {
        warn!(%status, duration_ms, "Request completed with client error");
    } else {
        info!(%status, duration_ms, "Request completed");
    }

    response
}

// ============================================================================
// Response Types
// ============================================================================

/// Acknowledgement for an accepted delivery
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// `ignored`, `dispatched` or `failed`
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub egress_id: Option<String>,
}

impl From<DispatchOutcome> for WebhookResponse {
    fn from(outcome: DispatchOutcome) -> Self {
        let label = outcome.as_str().to_string();
        match outcome {
            DispatchOutcome::Ignored { event } => Self {
                outcome: label,
                event: Some(event),
                room: None,
                egress_id: None,
            },
            DispatchOutcome::Dispatched { room, egress_id } => Self {
                outcome: label,
                event: None,
                room: Some(room),
                egress_id: Some(egress_id),
            },
            DispatchOutcome::Failed { room, .. } => Self {
                outcome: label,
                event: None,
                room: Some(room),
                egress_id: None,
            },
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    /// Active storage provider
    pub storage: String,
}
