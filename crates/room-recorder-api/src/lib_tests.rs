//! Tests for routing, middleware and handler status mapping.

use super::*;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use room_recorder_core::{
    storage::{GcpStorage, StorageSelection},
    AuthError, DispatchError, EgressInfo, FileType, RoomCompositeEgressRequest,
};
use std::sync::Mutex;
use tower::ServiceExt;

// ============================================================================
// Test Doubles
// ============================================================================

/// Authenticator accepting exactly one header value
struct FixedTokenAuthenticator {
    expected: &'static str,
}

#[async_trait]
impl WebhookAuthenticator for FixedTokenAuthenticator {
    async fn authenticate(
        &self,
        authorization: Option<&str>,
        _body: &[u8],
    ) -> Result<(), AuthError> {
        match authorization {
            Some(value) if value == self.expected => Ok(()),
            Some(_) => Err(AuthError::InvalidToken {
                message: "signature mismatch".to_string(),
            }),
            None => Err(AuthError::MissingAuthorization),
        }
    }
}

#[derive(Default)]
struct CountingEgressClient {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl EgressClient for CountingEgressClient {
    async fn start_room_composite_egress(
        &self,
        request: RoomCompositeEgressRequest,
    ) -> Result<EgressInfo, DispatchError> {
        self.calls.lock().unwrap().push(request.room_name.clone());
        Ok(EgressInfo {
            egress_id: format!("EG_{}", request.room_name),
            room_id: String::new(),
            room_name: request.room_name,
            status: None,
        })
    }
}

fn test_config() -> Arc<Configuration> {
    Arc::new(Configuration {
        livekit_host: "http://localhost:7880".to_string(),
        livekit_api_key: "APIkey".to_string(),
        livekit_api_secret: "secret".to_string(),
        webhook_api_key: "APIkey".to_string(),
        listen_port: 0,
        layout: "grid".to_string(),
        file_type: FileType::Ogg,
        file_path: "recordings/{room_name}-{time}".to_string(),
        storage: StorageSelection::Gcp(GcpStorage {
            credentials_json: "{}".to_string(),
            bucket: "gb".to_string(),
            proxy: None,
        }),
    })
}

fn test_router() -> (Router, Arc<CountingEgressClient>) {
    let egress = Arc::new(CountingEgressClient::default());
    let state = AppState::new(
        test_config(),
        Arc::new(FixedTokenAuthenticator { expected: "good" }),
        egress.clone(),
    );
    (create_router(state), egress)
}

fn webhook_request(authorization: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(WEBHOOK_PATH)
        .header("content-type", "application/webhook+json");
    if let Some(value) = authorization {
        builder = builder.header("authorization", value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Webhook Route Tests
// ============================================================================

/// Verify that an authenticated room_started delivery is dispatched.
#[tokio::test]
async fn test_room_started_is_dispatched() {
    // Arrange
    let (router, egress) = test_router();
    let request = webhook_request(
        Some("good"),
        r#"{"event":"room_started","room":{"name":"r1"}}"#,
    );

    // Act
    let response = router.oneshot(request).await.unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["outcome"], "dispatched");
    assert_eq!(body["room"], "r1");
    assert_eq!(body["egress_id"], "EG_r1");
    assert_eq!(*egress.calls.lock().unwrap(), vec!["r1".to_string()]);
}

#[tokio::test]
async fn test_unauthenticated_delivery_is_rejected_before_parsing() {
    let (router, egress) = test_router();

    let response = router
        .oneshot(webhook_request(Some("bad"), "{not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(egress.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_authorization_is_rejected() {
    let (router, _egress) = test_router();

    let response = router
        .oneshot(webhook_request(None, r#"{"event":"room_started"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_payload_is_bad_request() {
    let (router, _egress) = test_router();

    let response = router
        .oneshot(webhook_request(Some("good"), "{not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_other_events_are_acknowledged() {
    let (router, egress) = test_router();

    let response = router
        .oneshot(webhook_request(
            Some("good"),
            r#"{"event":"participant_joined"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["outcome"], "ignored");
    assert_eq!(body["event"], "participant_joined");
    assert!(egress.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_get_on_webhook_route_is_not_allowed() {
    let (router, _egress) = test_router();

    let response = router
        .oneshot(
            Request::builder()
                .uri(WEBHOOK_PATH)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

// ============================================================================
// Health and Middleware Tests
// ============================================================================

#[tokio::test]
async fn test_health_reports_healthy() {
    let (router, _egress) = test_router();

    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "gcp");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_correlation_id_is_echoed() {
    let (router, _egress) = test_router();

    let response = router
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(CORRELATION_ID_HEADER, "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers().get(CORRELATION_ID_HEADER).unwrap(),
        "abc-123"
    );
}

#[tokio::test]
async fn test_correlation_id_is_generated_when_absent() {
    let (router, _egress) = test_router();

    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let generated = response
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(uuid::Uuid::parse_str(generated).is_ok());
}

#[test]
fn test_failed_outcome_response_has_no_egress_id() {
    let response = WebhookResponse::from(DispatchOutcome::Failed {
        room: "r1".to_string(),
        error: "boom".to_string(),
    });

    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["outcome"], "failed");
    assert_eq!(json["room"], "r1");
    assert!(json.get("egress_id").is_none());
}
