//! # Configuration
//!
//! Resolves the process-wide [`Configuration`] once at startup.
//!
//! Sources (applied in order, later sources override earlier ones):
//!  1. Built-in defaults
//!  2. YAML file (`config.yaml` unless another path is given), with `${VAR}`
//!     references expanded from the environment before parsing
//!  3. Environment variables (`LIVEKIT_HOST`, `S3_BUCKET`, ...)
//!
//! The environment winning over the file is relied upon by existing
//! deployments and must not change.
//!
//! Validation rejects any configuration that does not name exactly one
//! storage provider with all of its required fields. Errors are fatal; the
//! service must not start with an invalid configuration.

use crate::storage::{
    redact, AliOssStorage, AzureStorage, GcpStorage, S3Storage, StorageProvider, StorageSelection,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

pub mod duration;
pub mod expand;
pub mod layer;

pub use layer::{env_keys, AliOssLayer, AzureLayer, ConfigLayer, GcpLayer, S3Layer, StorageLayer};

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

pub const DEFAULT_LIVEKIT_HOST: &str = "http://localhost:7880";
pub const DEFAULT_LISTEN_PORT: u16 = 8080;
pub const DEFAULT_LAYOUT: &str = "grid";
pub const DEFAULT_FILE_TYPE: &str = "MP4";
pub const DEFAULT_FILE_PATH: &str = "recordings/{room_name}-{time}";
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Environment variable naming the configuration file
pub const CONFIG_FILE_ENV: &str = "CONFIG_FILE";

// ============================================================================
// Errors
// ============================================================================

/// Configuration errors, all fatal at startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {message}")]
    FileRead { path: String, message: String },

    #[error("Failed to parse configuration file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("{key} is required")]
    MissingRequired { key: String },

    #[error("{message}")]
    IncompleteStorage {
        provider: StorageProvider,
        message: String,
    },

    #[error("at least one storage provider must be configured")]
    NoStorageProvider,

    #[error("only one storage provider can be configured at a time (found: {})", join_providers(.providers))]
    MultipleStorageProviders { providers: Vec<StorageProvider> },
}

fn join_providers(providers: &[StorageProvider]) -> String {
    providers
        .iter()
        .map(StorageProvider::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// File Type
// ============================================================================

/// Container format of the recorded file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileType {
    #[default]
    Mp4,
    Webm,
    Ogg,
}

impl FileType {
    /// Parse a configured value, falling back to MP4 for unknown formats
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            warn!(file_type = %value, "Unknown file type, falling back to MP4");
            Self::Mp4
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp4 => "MP4",
            Self::Webm => "WEBM",
            Self::Ogg => "OGG",
        }
    }
}

impl FromStr for FileType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MP4" => Ok(Self::Mp4),
            "WEBM" => Ok(Self::Webm),
            "OGG" => Ok(Self::Ogg),
            _ => Err(ConfigError::InvalidValue {
                key: "file_type".to_string(),
                message: format!("'{}' is not one of MP4, WEBM, OGG", s),
            }),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Validated, immutable service configuration
#[derive(Clone, PartialEq, Eq)]
pub struct Configuration {
    /// LiveKit server URL used for egress calls
    pub livekit_host: String,
    pub livekit_api_key: String,
    pub livekit_api_secret: String,
    /// API key the LiveKit server signs webhooks with
    pub webhook_api_key: String,
    pub listen_port: u16,
    /// Composite recording layout name (e.g. `grid`, `speaker`)
    pub layout: String,
    pub file_type: FileType,
    /// Output path template; `{room_name}` and `{time}` are expanded by LiveKit
    pub file_path: String,
    pub storage: StorageSelection,
}

impl Configuration {
    /// Validate a merged layer and build the final configuration.
    ///
    /// # Errors
    /// - `ConfigError::MissingRequired` for an empty API key, API secret or
    ///   webhook key
    /// - `ConfigError::IncompleteStorage` when the configured provider lacks
    ///   a required field
    /// - `ConfigError::NoStorageProvider` / `MultipleStorageProviders` unless
    ///   exactly one provider is configured
    pub fn from_layer(layer: ConfigLayer) -> Result<Self, ConfigError> {
        let livekit_api_key = required(layer.livekit_api_key, env_keys::LIVEKIT_API_KEY)?;
        let livekit_api_secret =
            required(layer.livekit_api_secret, env_keys::LIVEKIT_API_SECRET)?;
        let webhook_api_key = required(layer.webhook_api_key, env_keys::WEBHOOK_API_KEY)?;

        let storage = resolve_storage(layer.storage)?;

        Ok(Self {
            livekit_host: layer
                .livekit_host
                .unwrap_or_else(|| DEFAULT_LIVEKIT_HOST.to_string()),
            livekit_api_key,
            livekit_api_secret,
            webhook_api_key,
            listen_port: layer.listen_port.unwrap_or(DEFAULT_LISTEN_PORT),
            layout: layer.layout.unwrap_or_else(|| DEFAULT_LAYOUT.to_string()),
            file_type: layer
                .file_type
                .as_deref()
                .map(FileType::parse_lenient)
                .unwrap_or_default(),
            file_path: layer
                .file_path
                .unwrap_or_else(|| DEFAULT_FILE_PATH.to_string()),
            storage,
        })
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("livekit_host", &self.livekit_host)
            .field("livekit_api_key", &self.livekit_api_key)
            .field("livekit_api_secret", &redact(&self.livekit_api_secret))
            .field("webhook_api_key", &self.webhook_api_key)
            .field("listen_port", &self.listen_port)
            .field("layout", &self.layout)
            .field("file_type", &self.file_type)
            .field("file_path", &self.file_path)
            .field("storage", &self.storage)
            .finish()
    }
}

fn required(value: Option<String>, key: &str) -> Result<String, ConfigError> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingRequired {
            key: key.to_string(),
        }),
    }
}

fn incomplete(provider: StorageProvider, message: &str) -> ConfigError {
    ConfigError::IncompleteStorage {
        provider,
        message: message.to_string(),
    }
}

fn all_present(fields: &[&str]) -> bool {
    fields.iter().all(|field| !field.is_empty())
}

/// Collapse the storage blocks into the single active provider
fn resolve_storage(storage: StorageLayer) -> Result<StorageSelection, ConfigError> {
    let mut configured = Vec::new();

    if let Some(s3) = storage.s3 {
        let s3 = S3Storage {
            access_key: s3.access_key.unwrap_or_default(),
            secret: s3.secret.unwrap_or_default(),
            session_token: s3.session_token.unwrap_or_default(),
            region: s3.region.unwrap_or_default(),
            endpoint: s3.endpoint.unwrap_or_default(),
            bucket: s3.bucket.unwrap_or_default(),
            proxy: s3.proxy_config,
            max_retries: s3.max_retries,
            max_retry_delay: s3.max_retry_delay,
            min_retry_delay: s3.min_retry_delay,
            aws_log_level: s3.aws_log_level,
        };
        if s3.bucket.is_empty() {
            return Err(incomplete(
                StorageProvider::S3,
                "S3 bucket is required when S3 storage is configured",
            ));
        }
        configured.push(StorageSelection::S3(s3));
    }

    if let Some(azure) = storage.azure {
        let azure = AzureStorage {
            account_name: azure.account_name.unwrap_or_default(),
            account_key: azure.account_key.unwrap_or_default(),
            container_name: azure.container_name.unwrap_or_default(),
        };
        if !all_present(&[
            azure.account_name.as_str(),
            azure.account_key.as_str(),
            azure.container_name.as_str(),
        ]) {
            return Err(incomplete(
                StorageProvider::Azure,
                "Azure account_name, account_key, and container_name are all required when Azure storage is configured",
            ));
        }
        configured.push(StorageSelection::Azure(azure));
    }

    if let Some(gcp) = storage.gcp {
        let gcp = GcpStorage {
            credentials_json: gcp.credentials_json.unwrap_or_default(),
            bucket: gcp.bucket.unwrap_or_default(),
            proxy: gcp.proxy_config,
        };
        if !all_present(&[gcp.credentials_json.as_str(), gcp.bucket.as_str()]) {
            return Err(incomplete(
                StorageProvider::Gcp,
                "GCP credentials_json and bucket are required when GCP storage is configured",
            ));
        }
        configured.push(StorageSelection::Gcp(gcp));
    }

    if let Some(oss) = storage.alioss {
        let oss = AliOssStorage {
            access_key: oss.access_key.unwrap_or_default(),
            secret: oss.secret.unwrap_or_default(),
            region: oss.region.unwrap_or_default(),
            endpoint: oss.endpoint.unwrap_or_default(),
            bucket: oss.bucket.unwrap_or_default(),
        };
        if !all_present(&[
            oss.access_key.as_str(),
            oss.secret.as_str(),
            oss.region.as_str(),
            oss.bucket.as_str(),
        ]) {
            return Err(incomplete(
                StorageProvider::AliOss,
                "AliOSS access_key, secret, region, and bucket are all required when AliOSS storage is configured",
            ));
        }
        configured.push(StorageSelection::AliOss(oss));
    }

    match configured.len() {
        0 => Err(ConfigError::NoStorageProvider),
        1 => Ok(configured.remove(0)),
        _ => Err(ConfigError::MultipleStorageProviders {
            providers: configured.iter().map(StorageSelection::provider).collect(),
        }),
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Loads and validates the configuration from file and environment.
///
/// The environment is read through an injected lookup function so the
/// resolver can be exercised without touching process state.
pub struct ConfigResolver<F> {
    config_path: PathBuf,
    lookup: F,
}

impl ConfigResolver<fn(&str) -> Option<String>> {
    /// Resolver backed by the real process environment
    pub fn from_process_env(config_path: impl Into<PathBuf>) -> Self {
        Self::new(config_path, process_env)
    }
}

impl<F> ConfigResolver<F>
where
    F: Fn(&str) -> Option<String>,
{
    pub fn new(config_path: impl Into<PathBuf>, lookup: F) -> Self {
        Self {
            config_path: config_path.into(),
            lookup,
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Merge defaults, file and environment, then validate.
    ///
    /// A missing configuration file is not an error; the remaining layers
    /// are used on their own.
    pub fn resolve(&self) -> Result<Configuration, ConfigError> {
        let file_layer = self.load_file_layer()?;
        let env_layer = ConfigLayer::from_env(&self.lookup)?;

        let merged = ConfigLayer::defaults().merge(file_layer).merge(env_layer);
        let config = Configuration::from_layer(merged)?;

        info!(
            livekit_host = %config.livekit_host,
            listen_port = config.listen_port,
            layout = %config.layout,
            file_type = %config.file_type,
            storage = %config.storage.provider(),
            "Configuration resolved"
        );

        Ok(config)
    }

    fn load_file_layer(&self) -> Result<ConfigLayer, ConfigError> {
        let path = &self.config_path;
        if !path.exists() {
            info!(
                path = %path.display(),
                "No config file found, using environment variables"
            );
            return Ok(ConfigLayer::default());
        }

        info!(path = %path.display(), "Loading configuration file");
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        ConfigLayer::from_yaml(&text, &self.lookup).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// Configuration file path from `CONFIG_FILE`, or `config.yaml`
pub fn default_config_path<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    lookup(CONFIG_FILE_ENV)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Lookup function reading the process environment
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
