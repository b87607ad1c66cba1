//! Upload destinations for finished recordings.
//!
//! Exactly one provider is active per deployment. The selection is a closed
//! enum so every consumer must handle each provider explicitly; adding a new
//! backend is a compile-time checked change.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;

/// The storage backend a recording is uploaded to
#[derive(Clone, PartialEq, Eq)]
pub enum StorageSelection {
    S3(S3Storage),
    Azure(AzureStorage),
    Gcp(GcpStorage),
    AliOss(AliOssStorage),
}

impl StorageSelection {
    /// Provider tag of the active variant
    pub fn provider(&self) -> StorageProvider {
        match self {
            Self::S3(_) => StorageProvider::S3,
            Self::Azure(_) => StorageProvider::Azure,
            Self::Gcp(_) => StorageProvider::Gcp,
            Self::AliOss(_) => StorageProvider::AliOss,
        }
    }

    /// Bucket or container the recording will land in
    pub fn destination(&self) -> &str {
        match self {
            Self::S3(s3) => &s3.bucket,
            Self::Azure(azure) => &azure.container_name,
            Self::Gcp(gcp) => &gcp.bucket,
            Self::AliOss(oss) => &oss.bucket,
        }
    }
}

impl fmt::Debug for StorageSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S3(s3) => f.debug_tuple("S3").field(s3).finish(),
            Self::Azure(azure) => f.debug_tuple("Azure").field(azure).finish(),
            Self::Gcp(gcp) => f.debug_tuple("Gcp").field(gcp).finish(),
            Self::AliOss(oss) => f.debug_tuple("AliOss").field(oss).finish(),
        }
    }
}

/// Provider tag without credentials, safe to log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageProvider {
    S3,
    Azure,
    Gcp,
    AliOss,
}

impl StorageProvider {
    /// Configuration key of the provider's storage block
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::Azure => "azure",
            Self::Gcp => "gcp",
            Self::AliOss => "alioss",
        }
    }
}

impl fmt::Display for StorageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound proxy used by the egress service when uploading
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .finish()
    }
}

/// Amazon S3 or any S3-compatible object store
#[derive(Clone, Default, PartialEq, Eq)]
pub struct S3Storage {
    pub access_key: String,
    pub secret: String,
    pub session_token: String,
    pub region: String,
    pub endpoint: String,
    pub bucket: String,
    pub proxy: Option<ProxyConfig>,
    pub max_retries: Option<u32>,
    pub max_retry_delay: Option<Duration>,
    pub min_retry_delay: Option<Duration>,
    pub aws_log_level: Option<String>,
}

impl fmt::Debug for S3Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Storage")
            .field("access_key", &self.access_key)
            .field("secret", &redact(&self.secret))
            .field("session_token", &redact(&self.session_token))
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("proxy", &self.proxy)
            .field("max_retries", &self.max_retries)
            .field("max_retry_delay", &self.max_retry_delay)
            .field("min_retry_delay", &self.min_retry_delay)
            .field("aws_log_level", &self.aws_log_level)
            .finish()
    }
}

/// Azure Blob Storage
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AzureStorage {
    pub account_name: String,
    pub account_key: String,
    pub container_name: String,
}

impl fmt::Debug for AzureStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureStorage")
            .field("account_name", &self.account_name)
            .field("account_key", &redact(&self.account_key))
            .field("container_name", &self.container_name)
            .finish()
    }
}

/// Google Cloud Storage
#[derive(Clone, Default, PartialEq, Eq)]
pub struct GcpStorage {
    /// Service account credentials JSON (content, not a path)
    pub credentials_json: String,
    pub bucket: String,
    pub proxy: Option<ProxyConfig>,
}

impl fmt::Debug for GcpStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcpStorage")
            .field("credentials_json", &redact(&self.credentials_json))
            .field("bucket", &self.bucket)
            .field("proxy", &self.proxy)
            .finish()
    }
}

/// Alibaba Cloud Object Storage Service
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AliOssStorage {
    pub access_key: String,
    pub secret: String,
    pub region: String,
    pub endpoint: String,
    pub bucket: String,
}

impl fmt::Debug for AliOssStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AliOssStorage")
            .field("access_key", &self.access_key)
            .field("secret", &redact(&self.secret))
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .finish()
    }
}

pub(crate) fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        ""
    } else {
        "[REDACTED]"
    }
}
