//! LiveKit access tokens.
//!
//! LiveKit authenticates API calls and webhook deliveries with HS256 JWTs
//! whose issuer is the API key and whose signing key is the matching API
//! secret. Webhook tokens additionally carry a `sha256` claim binding the
//! token to the request body.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;

/// Lifetime of tokens minted for outbound API calls
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(10 * 60);

/// Errors raised while minting a token
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("API key and secret are required to sign a token")]
    MissingCredentials,

    #[error("Failed to sign token: {message}")]
    Signing { message: String },
}

/// Permissions granted to the bearer for room and egress APIs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoGrant {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub room_record: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub room_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

impl VideoGrant {
    /// Grant needed to start and stop egress
    pub fn room_record() -> Self {
        Self {
            room_record: true,
            ..Default::default()
        }
    }
}

/// JWT claim set shared by API and webhook tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// API key that signed the token
    pub iss: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sub: String,
    #[serde(default)]
    pub nbf: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoGrant>,
    /// Base64 SHA-256 digest of the request body (webhooks only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Builder for a signed LiveKit access token
#[derive(Clone)]
pub struct AccessToken {
    api_key: String,
    api_secret: String,
    ttl: Duration,
    identity: String,
    video: Option<VideoGrant>,
    sha256: Option<String>,
}

impl AccessToken {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            ttl: DEFAULT_TOKEN_TTL,
            identity: String::new(),
            video: None,
            sha256: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn with_video_grant(mut self, grant: VideoGrant) -> Self {
        self.video = Some(grant);
        self
    }

    /// Bind the token to a request body digest produced by [`body_digest`]
    pub fn with_sha256(mut self, digest: impl Into<String>) -> Self {
        self.sha256 = Some(digest.into());
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Sign the token with HS256.
    ///
    /// # Errors
    /// - `TokenError::MissingCredentials` when the key or secret is empty
    /// - `TokenError::Signing` when encoding fails
    pub fn to_jwt(&self) -> Result<String, TokenError> {
        if self.api_key.is_empty() || self.api_secret.is_empty() {
            return Err(TokenError::MissingCredentials);
        }

        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: self.api_key.clone(),
            sub: self.identity.clone(),
            nbf: now,
            exp: now + self.ttl.as_secs() as i64,
            video: self.video.clone(),
            sha256: self.sha256.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.api_secret.as_bytes()),
        )
        .map_err(|e| TokenError::Signing {
            message: e.to_string(),
        })
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .field("identity", &self.identity)
            .field("video", &self.video)
            .finish()
    }
}

/// Base64 (standard alphabet, padded) SHA-256 digest of `body`
pub fn body_digest(body: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(body))
}
