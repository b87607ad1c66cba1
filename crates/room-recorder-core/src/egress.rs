//! Room-composite egress requests and the client seam.
//!
//! [`RoomCompositeEgressRequest::for_room`] projects the configured storage
//! provider into the wire shape the LiveKit egress API expects. The transport
//! lives behind [`EgressClient`] so the dispatcher can be tested without a
//! LiveKit server.

use crate::config::{Configuration, FileType};
use crate::storage::{ProxyConfig, StorageSelection};
use crate::token::TokenError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(test)]
#[path = "egress_tests.rs"]
mod tests;

// ============================================================================
// Errors
// ============================================================================

/// Failure to start a recording
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to sign egress request: {0}")]
    Token(#[from] TokenError),

    #[error("Egress request could not be delivered: {message}")]
    Transport { message: String },

    #[error("Egress service rejected the request ({status} {code}): {message}")]
    Remote {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Invalid egress response: {message}")]
    InvalidResponse { message: String },
}

// ============================================================================
// Request Types
// ============================================================================

/// Container format requested from the egress service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EncodedFileType {
    Mp4,
    Ogg,
}

impl From<FileType> for EncodedFileType {
    /// The egress API has no WebM file type; WebM recordings are requested as MP4.
    fn from(file_type: FileType) -> Self {
        match file_type {
            FileType::Mp4 | FileType::Webm => Self::Mp4,
            FileType::Ogg => Self::Ogg,
        }
    }
}

/// Request to record every participant of a room into one file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomCompositeEgressRequest {
    pub room_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub layout: String,
    pub file_outputs: Vec<EncodedFileOutput>,
}

impl RoomCompositeEgressRequest {
    /// Build the request for `room_name` from the configured output settings.
    ///
    /// The path template is passed through untouched; LiveKit expands
    /// `{room_name}` and `{time}` itself.
    pub fn for_room(config: &Configuration, room_name: &str) -> Self {
        Self {
            room_name: room_name.to_string(),
            layout: config.layout.clone(),
            file_outputs: vec![EncodedFileOutput {
                file_type: config.file_type.into(),
                filepath: config.file_path.clone(),
                output: UploadTarget::from(&config.storage),
            }],
        }
    }
}

/// One file output of an egress
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodedFileOutput {
    pub file_type: EncodedFileType,
    pub filepath: String,
    #[serde(flatten)]
    pub output: UploadTarget,
}

/// Upload destination, serialized as the `output` oneof of the file output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum UploadTarget {
    #[serde(rename = "s3")]
    S3(S3Upload),
    #[serde(rename = "azure")]
    Azure(AzureBlobUpload),
    #[serde(rename = "gcp")]
    Gcp(GcpUpload),
    #[serde(rename = "aliOSS")]
    AliOss(AliOssUpload),
}

impl From<&StorageSelection> for UploadTarget {
    fn from(storage: &StorageSelection) -> Self {
        match storage {
            StorageSelection::S3(s3) => Self::S3(S3Upload {
                access_key: s3.access_key.clone(),
                secret: s3.secret.clone(),
                session_token: s3.session_token.clone(),
                region: s3.region.clone(),
                endpoint: s3.endpoint.clone(),
                bucket: s3.bucket.clone(),
                proxy: s3.proxy.clone(),
            }),
            StorageSelection::Azure(azure) => Self::Azure(AzureBlobUpload {
                account_name: azure.account_name.clone(),
                account_key: azure.account_key.clone(),
                container_name: azure.container_name.clone(),
            }),
            StorageSelection::Gcp(gcp) => Self::Gcp(GcpUpload {
                credentials: gcp.credentials_json.clone(),
                bucket: gcp.bucket.clone(),
                proxy: gcp.proxy.clone(),
            }),
            StorageSelection::AliOss(oss) => Self::AliOss(AliOssUpload {
                access_key: oss.access_key.clone(),
                secret: oss.secret.clone(),
                region: oss.region.clone(),
                endpoint: oss.endpoint.clone(),
                bucket: oss.bucket.clone(),
            }),
        }
    }
}

#[derive(Clone, PartialEq, Serialize)]
pub struct S3Upload {
    pub access_key: String,
    pub secret: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub session_token: String,
    pub region: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub endpoint: String,
    pub bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
}

#[derive(Clone, PartialEq, Serialize)]
pub struct AzureBlobUpload {
    pub account_name: String,
    pub account_key: String,
    pub container_name: String,
}

#[derive(Clone, PartialEq, Serialize)]
pub struct GcpUpload {
    /// Service account key JSON
    pub credentials: String,
    pub bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
}

#[derive(Clone, PartialEq, Serialize)]
pub struct AliOssUpload {
    pub access_key: String,
    pub secret: String,
    pub region: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub endpoint: String,
    pub bucket: String,
}

impl fmt::Debug for S3Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Upload")
            .field("access_key", &self.access_key)
            .field("secret", &"[REDACTED]")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("proxy", &self.proxy)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for AzureBlobUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureBlobUpload")
            .field("account_name", &self.account_name)
            .field("account_key", &"[REDACTED]")
            .field("container_name", &self.container_name)
            .finish()
    }
}

impl fmt::Debug for GcpUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcpUpload")
            .field("credentials", &"[REDACTED]")
            .field("bucket", &self.bucket)
            .field("proxy", &self.proxy)
            .finish()
    }
}

impl fmt::Debug for AliOssUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AliOssUpload")
            .field("access_key", &self.access_key)
            .field("secret", &"[REDACTED]")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .finish()
    }
}

// ============================================================================
// Response
// ============================================================================

/// Egress descriptor returned when a recording is accepted
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EgressInfo {
    #[serde(alias = "egressId")]
    pub egress_id: String,
    #[serde(default, alias = "roomId")]
    pub room_id: String,
    #[serde(default, alias = "roomName")]
    pub room_name: String,
    /// Status as reported by the server, either the enum name or its number
    #[serde(default)]
    pub status: Option<serde_json::Value>,
}

// ============================================================================
// Client Seam
// ============================================================================

/// Starts recordings on the LiveKit egress service
#[async_trait]
pub trait EgressClient: Send + Sync {
    /// Ask the egress service to start recording.
    ///
    /// # Errors
    /// Returns `DispatchError` when the request cannot be signed or
    /// delivered, or when the service rejects it.
    async fn start_room_composite_egress(
        &self,
        request: RoomCompositeEgressRequest,
    ) -> Result<EgressInfo, DispatchError>;
}
