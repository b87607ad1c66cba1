//! Tests for the Twirp egress client

use super::*;
use room_recorder_core::{
    storage::{S3Storage, StorageSelection},
    token::Claims,
    FileType,
};
use serde_json::json;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn request_for(room: &str) -> RoomCompositeEgressRequest {
    let config = Configuration {
        livekit_host: "http://localhost:7880".to_string(),
        livekit_api_key: "APIkey".to_string(),
        livekit_api_secret: "secret".to_string(),
        webhook_api_key: "APIkey".to_string(),
        listen_port: 8080,
        layout: "grid".to_string(),
        file_type: FileType::Mp4,
        file_path: "recordings/{room_name}-{time}".to_string(),
        storage: StorageSelection::S3(S3Storage {
            bucket: "b1".to_string(),
            ..Default::default()
        }),
    };
    RoomCompositeEgressRequest::for_room(&config, room)
}

fn client_for(server: &MockServer) -> TwirpEgressClient {
    TwirpEgressClient::new(&server.uri(), "APIkey", "secret", Duration::from_secs(5)).unwrap()
}

fn bearer_claims(request: &Request) -> Claims {
    let header = request
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    let token = header.strip_prefix("Bearer ").unwrap();
    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.validate_aud = false;
    jsonwebtoken::decode::<Claims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(b"secret"),
        &validation,
    )
    .unwrap()
    .claims
}

// ============================================================================
// Request Tests
// ============================================================================

/// Verify that the request is posted to the Twirp route with a signed token.
#[tokio::test]
async fn test_start_egress_posts_signed_request() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(START_ROOM_COMPOSITE_EGRESS_PATH))
        .and(header("content-type", "application/json"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "egress_id": "EG_abc",
            "room_name": "r1",
            "status": "EGRESS_STARTING"
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Act
    let info = client_for(&server)
        .start_room_composite_egress(request_for("r1"))
        .await
        .unwrap();

    // Assert
    assert_eq!(info.egress_id, "EG_abc");
    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["room_name"], "r1");
    assert_eq!(body["file_outputs"][0]["s3"]["bucket"], "b1");

    let claims = bearer_claims(&received[0]);
    assert_eq!(claims.iss, "APIkey");
    assert!(claims.video.unwrap().room_record);
    assert_eq!(claims.exp - claims.nbf, 600);
}

#[tokio::test]
async fn test_camel_case_response_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(START_ROOM_COMPOSITE_EGRESS_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "egressId": "EG_camel", "status": 0 })),
        )
        .mount(&server)
        .await;

    let info = client_for(&server)
        .start_room_composite_egress(request_for("r1"))
        .await
        .unwrap();

    assert_eq!(info.egress_id, "EG_camel");
}

// ============================================================================
// Error Tests
// ============================================================================

#[tokio::test]
async fn test_twirp_error_is_surfaced_as_remote() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(START_ROOM_COMPOSITE_EGRESS_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "code": "unavailable",
            "msg": "no response from servers"
        })))
        .mount(&server)
        .await;

    let result = client_for(&server)
        .start_room_composite_egress(request_for("r1"))
        .await;

    match result {
        Err(DispatchError::Remote {
            status,
            code,
            message,
        }) => {
            assert_eq!(status, 503);
            assert_eq!(code, "unavailable");
            assert_eq!(message, "no response from servers");
        }
        other => panic!("Expected Remote error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_twirp_error_body_is_kept_as_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let result = client_for(&server)
        .start_room_composite_egress(request_for("r1"))
        .await;

    assert!(matches!(
        result,
        Err(DispatchError::Remote { status: 502, ref message, .. }) if message == "bad gateway"
    ));
}

#[tokio::test]
async fn test_unparsable_success_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let result = client_for(&server)
        .start_room_composite_egress(request_for("r1"))
        .await;

    assert!(matches!(result, Err(DispatchError::InvalidResponse { .. })));
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let client =
        TwirpEgressClient::new("http://127.0.0.1:9", "APIkey", "secret", Duration::from_secs(2))
            .unwrap();

    let result = client.start_room_composite_egress(request_for("r1")).await;

    assert!(matches!(result, Err(DispatchError::Transport { .. })));
}

#[tokio::test]
async fn test_missing_credentials_fail_before_sending() {
    let server = MockServer::start().await;
    let client = TwirpEgressClient::new(&server.uri(), "APIkey", "", Duration::from_secs(2)).unwrap();

    let result = client.start_room_composite_egress(request_for("r1")).await;

    assert!(matches!(result, Err(DispatchError::Token(_))));
    assert!(server.received_requests().await.unwrap().is_empty());
}

// ============================================================================
// Host Rewriting Tests
// ============================================================================

#[test]
fn test_websocket_hosts_are_rewritten() {
    assert_eq!(http_base_url("wss://lk.example.com"), "https://lk.example.com");
    assert_eq!(http_base_url("ws://localhost:7880/"), "http://localhost:7880");
    assert_eq!(http_base_url("https://lk.example.com/"), "https://lk.example.com");
    assert_eq!(http_base_url("http://localhost:7880"), "http://localhost:7880");
}

#[test]
fn test_debug_redacts_secret() {
    let client =
        TwirpEgressClient::new("ws://localhost:7880", "APIkey", "hidden", DEFAULT_REQUEST_TIMEOUT)
            .unwrap();

    let debug = format!("{:?}", client);

    assert!(debug.contains("http://localhost:7880"));
    assert!(!debug.contains("hidden"));
}
