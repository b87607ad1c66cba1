//! Webhook delivery authentication.
//!
//! LiveKit signs every delivery with an HS256 token in the `Authorization`
//! header. The token is issued by an API key, signed with that key's secret,
//! and carries the base64 SHA-256 digest of the body in its `sha256` claim.

use crate::config::Configuration;
use crate::token::{body_digest, Claims};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, instrument, warn};

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;

/// Reasons a delivery is rejected as unauthenticated
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization header is missing")]
    MissingAuthorization,

    #[error("Authorization token is malformed: {message}")]
    MalformedToken { message: String },

    #[error("Token issued by unknown API key '{api_key}'")]
    UnknownApiKey { api_key: String },

    #[error("Token verification failed: {message}")]
    InvalidToken { message: String },

    #[error("Body digest does not match the token")]
    BodyHashMismatch,
}

// ============================================================================
// Key Provider
// ============================================================================

/// Maps API keys to their signing secrets
pub trait KeyProvider: Send + Sync {
    fn secret_for(&self, api_key: &str) -> Option<String>;
}

/// In-memory key provider
#[derive(Clone, Default)]
pub struct SimpleKeyProvider {
    keys: HashMap<String, String>,
}

impl SimpleKeyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.keys.insert(api_key.into(), secret.into());
        self
    }

    /// Trust the LiveKit API key and the webhook key, both signed with the
    /// configured API secret
    pub fn from_config(config: &Configuration) -> Self {
        Self::new()
            .with_key(&config.livekit_api_key, &config.livekit_api_secret)
            .with_key(&config.webhook_api_key, &config.livekit_api_secret)
    }
}

impl KeyProvider for SimpleKeyProvider {
    fn secret_for(&self, api_key: &str) -> Option<String> {
        self.keys.get(api_key).cloned()
    }
}

impl fmt::Debug for SimpleKeyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.keys.keys().collect();
        keys.sort();
        f.debug_struct("SimpleKeyProvider")
            .field("api_keys", &keys)
            .finish()
    }
}

// ============================================================================
// Authenticator
// ============================================================================

/// Decides whether a raw delivery was sent by a trusted LiveKit server
#[async_trait]
pub trait WebhookAuthenticator: Send + Sync {
    /// Verify `authorization` (the raw header value) against `body`.
    ///
    /// # Errors
    /// Any `AuthError` means the delivery must be rejected with 401 and
    /// not looked at further.
    async fn authenticate(&self, authorization: Option<&str>, body: &[u8])
        -> Result<(), AuthError>;
}

/// Verifies LiveKit-signed webhook tokens
pub struct TokenWebhookAuthenticator {
    keys: Arc<dyn KeyProvider>,
}

impl TokenWebhookAuthenticator {
    pub fn new(keys: Arc<dyn KeyProvider>) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl WebhookAuthenticator for TokenWebhookAuthenticator {
    #[instrument(skip_all, fields(body_len = body.len()))]
    async fn authenticate(
        &self,
        authorization: Option<&str>,
        body: &[u8],
    ) -> Result<(), AuthError> {
        let header = authorization
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(AuthError::MissingAuthorization)?;
        let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();

        let api_key = unverified_issuer(token)?;
        let secret = self.keys.secret_for(&api_key).ok_or_else(|| {
            warn!(api_key = %api_key, "Webhook signed by unknown API key");
            AuthError::UnknownApiKey {
                api_key: api_key.clone(),
            }
        })?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        validation.validate_nbf = true;
        validation.set_issuer(&[api_key.as_str()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map_err(|e| AuthError::InvalidToken {
            message: e.to_string(),
        })?
        .claims;

        let expected = body_digest(body);
        let claimed = claims.sha256.unwrap_or_default();
        if !bool::from(claimed.as_bytes().ct_eq(expected.as_bytes())) {
            return Err(AuthError::BodyHashMismatch);
        }

        debug!(api_key = %api_key, "Webhook authenticated");
        Ok(())
    }
}

#[derive(Deserialize)]
struct IssuerClaim {
    iss: String,
}

/// Read the issuer before the signature is checked, to pick the secret
fn unverified_issuer(token: &str) -> Result<String, AuthError> {
    let malformed = |message: &str| AuthError::MalformedToken {
        message: message.to_string(),
    };

    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(malformed("expected three dot-separated segments")),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| malformed("payload is not base64url"))?;
    let claim: IssuerClaim =
        serde_json::from_slice(&bytes).map_err(|_| malformed("payload has no issuer"))?;

    if claim.iss.is_empty() {
        return Err(malformed("issuer is empty"));
    }
    Ok(claim.iss)
}
