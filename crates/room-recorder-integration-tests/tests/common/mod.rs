//! Common test utilities for room-recorder integration tests
//!
//! This module provides:
//! - A recording mock of [`EgressClient`]
//! - Configuration fixtures for each storage provider
//! - Helpers for building signed webhook requests

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::Request,
    response::Response,
    Router,
};
use room_recorder_api::{create_router, AppState, WEBHOOK_PATH};
use room_recorder_core::{
    storage::{S3Storage, StorageSelection},
    token::{body_digest, AccessToken},
    Configuration, DispatchError, EgressClient, EgressInfo, FileType, RoomCompositeEgressRequest,
    SimpleKeyProvider, TokenWebhookAuthenticator,
};
use std::sync::{Arc, Mutex};

pub const API_KEY: &str = "APIintegration";
pub const API_SECRET: &str = "integration-secret";

// ============================================================================
// Mock Egress Client
// ============================================================================

/// Egress client that records every request it receives
#[derive(Clone)]
#[allow(dead_code)]
pub struct MockEgressClient {
    calls: Arc<Mutex<Vec<RoomCompositeEgressRequest>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl MockEgressClient {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Make every subsequent call fail with a remote error
    #[allow(dead_code)]
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> Vec<RoomCompositeEgressRequest> {
        self.calls.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl EgressClient for MockEgressClient {
    async fn start_room_composite_egress(
        &self,
        request: RoomCompositeEgressRequest,
    ) -> Result<EgressInfo, DispatchError> {
        self.calls.lock().unwrap().push(request.clone());

        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(DispatchError::Remote {
                status: 503,
                code: "unavailable".to_string(),
                message,
            });
        }

        Ok(EgressInfo {
            egress_id: format!("EG_{}", request.room_name),
            room_id: String::new(),
            room_name: request.room_name,
            status: None,
        })
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Configuration recording to S3 bucket `b1`
#[allow(dead_code)]
pub fn s3_configuration() -> Configuration {
    configuration_with(StorageSelection::S3(S3Storage {
        bucket: "b1".to_string(),
        ..Default::default()
    }))
}

#[allow(dead_code)]
pub fn configuration_with(storage: StorageSelection) -> Configuration {
    Configuration {
        livekit_host: "http://localhost:7880".to_string(),
        livekit_api_key: API_KEY.to_string(),
        livekit_api_secret: API_SECRET.to_string(),
        webhook_api_key: API_KEY.to_string(),
        listen_port: 0,
        layout: "grid".to_string(),
        file_type: FileType::Mp4,
        file_path: "recordings/{room_name}-{time}".to_string(),
        storage,
    }
}

/// Router wired with the real token authenticator and the given egress client
#[allow(dead_code)]
pub fn create_test_router(config: Configuration, egress: Arc<dyn EgressClient>) -> Router {
    let keys = SimpleKeyProvider::from_config(&config);
    let authenticator = Arc::new(TokenWebhookAuthenticator::new(Arc::new(keys)));
    create_router(AppState::new(Arc::new(config), authenticator, egress))
}

/// Token LiveKit would attach to a delivery of `body`
#[allow(dead_code)]
pub fn sign_body(body: &str, secret: &str) -> String {
    AccessToken::new(API_KEY, secret)
        .with_sha256(body_digest(body.as_bytes()))
        .to_jwt()
        .unwrap()
}

/// POST to the webhook route with a token signed for `body`
#[allow(dead_code)]
pub fn signed_webhook_request(body: &str) -> Request<Body> {
    webhook_request(Some(&sign_body(body, API_SECRET)), body)
}

#[allow(dead_code)]
pub fn webhook_request(authorization: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(WEBHOOK_PATH)
        .header("content-type", "application/webhook+json");
    if let Some(value) = authorization {
        builder = builder.header("authorization", value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[allow(dead_code)]
pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
