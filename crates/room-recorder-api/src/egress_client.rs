//! Twirp client for the LiveKit egress service.

use async_trait::async_trait;
use room_recorder_core::{
    token::{AccessToken, VideoGrant},
    Configuration, DispatchError, EgressClient, EgressInfo, RoomCompositeEgressRequest,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

#[cfg(test)]
#[path = "egress_client_tests.rs"]
mod tests;

pub const START_ROOM_COMPOSITE_EGRESS_PATH: &str =
    "/twirp/livekit.Egress/StartRoomCompositeEgress";

/// Request timeout for egress calls
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error body returned by Twirp servers
#[derive(Debug, Deserialize)]
struct TwirpErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    msg: String,
}

/// [`EgressClient`] speaking Twirp JSON over HTTP
pub struct TwirpEgressClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl TwirpEgressClient {
    /// Create a client for the LiveKit server at `host`.
    ///
    /// `ws://` and `wss://` hosts are accepted and rewritten to their HTTP
    /// equivalents.
    ///
    /// # Errors
    /// Returns `DispatchError::Transport` if the HTTP client cannot be created.
    pub fn new(
        host: &str,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DispatchError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::Transport {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            base_url: http_base_url(host),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        })
    }

    pub fn from_config(config: &Configuration) -> Result<Self, DispatchError> {
        Self::new(
            &config.livekit_host,
            &config.livekit_api_key,
            &config.livekit_api_secret,
            DEFAULT_REQUEST_TIMEOUT,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl std::fmt::Debug for TwirpEgressClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwirpEgressClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl EgressClient for TwirpEgressClient {
    #[instrument(skip(self, request), fields(room = %request.room_name))]
    async fn start_room_composite_egress(
        &self,
        request: RoomCompositeEgressRequest,
    ) -> Result<EgressInfo, DispatchError> {
        let token = AccessToken::new(&self.api_key, &self.api_secret)
            .with_video_grant(VideoGrant::room_record())
            .to_jwt()?;

        let url = format!("{}{}", self.base_url, START_ROOM_COMPOSITE_EGRESS_PATH);
        debug!(url = %url, "Sending egress request");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| DispatchError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| DispatchError::Transport {
            message: format!("Failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            let error = serde_json::from_slice::<TwirpErrorBody>(&body).unwrap_or_else(|_| {
                TwirpErrorBody {
                    code: "unknown".to_string(),
                    msg: String::from_utf8_lossy(&body).into_owned(),
                }
            });
            return Err(DispatchError::Remote {
                status: status.as_u16(),
                code: error.code,
                message: error.msg,
            });
        }

        serde_json::from_slice(&body).map_err(|e| DispatchError::InvalidResponse {
            message: e.to_string(),
        })
    }
}

/// HTTP base URL for a LiveKit host, without a trailing slash
pub fn http_base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if let Some(rest) = host.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else if let Some(rest) = host.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else {
        host.to_string()
    }
}
