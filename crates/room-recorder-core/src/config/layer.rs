//! Configuration layers and their ordered merge.
//!
//! A [`ConfigLayer`] is a partial configuration where every field is
//! optional. Three layers are produced at startup (built-in defaults, the
//! YAML file, the process environment) and folded together with
//! [`ConfigLayer::merge`], later layers winning field by field.

use super::{duration, expand::expand_variables, ConfigError};
use crate::storage::ProxyConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[cfg(test)]
#[path = "layer_tests.rs"]
mod tests;

/// Environment variable names recognised by [`ConfigLayer::from_env`]
pub mod env_keys {
    pub const LIVEKIT_HOST: &str = "LIVEKIT_HOST";
    pub const LIVEKIT_API_KEY: &str = "LIVEKIT_API_KEY";
    pub const LIVEKIT_API_SECRET: &str = "LIVEKIT_API_SECRET";
    pub const WEBHOOK_API_KEY: &str = "WEBHOOK_API_KEY";
    pub const PORT: &str = "PORT";
    pub const LAYOUT: &str = "LAYOUT";
    pub const FILE_TYPE: &str = "FILE_TYPE";
    pub const FILE_PATH: &str = "FILE_PATH";

    pub const S3_ACCESS_KEY: &str = "S3_ACCESS_KEY";
    pub const S3_SECRET: &str = "S3_SECRET";
    pub const S3_SESSION_TOKEN: &str = "S3_SESSION_TOKEN";
    pub const S3_REGION: &str = "S3_REGION";
    pub const S3_ENDPOINT: &str = "S3_ENDPOINT";
    pub const S3_BUCKET: &str = "S3_BUCKET";

    pub const AZURE_STORAGE_ACCOUNT: &str = "AZURE_STORAGE_ACCOUNT";
    pub const AZURE_STORAGE_KEY: &str = "AZURE_STORAGE_KEY";
    pub const AZURE_CONTAINER_NAME: &str = "AZURE_CONTAINER_NAME";

    pub const GOOGLE_APPLICATION_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";
    pub const GCP_BUCKET: &str = "GCP_BUCKET";

    pub const ALIOSS_ACCESS_KEY: &str = "ALIOSS_ACCESS_KEY";
    pub const ALIOSS_SECRET: &str = "ALIOSS_SECRET";
    pub const ALIOSS_REGION: &str = "ALIOSS_REGION";
    pub const ALIOSS_ENDPOINT: &str = "ALIOSS_ENDPOINT";
    pub const ALIOSS_BUCKET: &str = "ALIOSS_BUCKET";
}

/// Field-wise overlay of one partial value onto another
trait Merge {
    fn merge(self, overlay: Self) -> Self;
}

fn merge_block<T: Merge>(base: Option<T>, overlay: Option<T>) -> Option<T> {
    match (base, overlay) {
        (Some(base), Some(overlay)) => Some(base.merge(overlay)),
        (base, overlay) => overlay.or(base),
    }
}

// ============================================================================
// Layer Types
// ============================================================================

/// One source of configuration values
#[derive(Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub livekit_host: Option<String>,
    pub livekit_api_key: Option<String>,
    pub livekit_api_secret: Option<String>,
    pub webhook_api_key: Option<String>,
    pub listen_port: Option<u16>,
    pub layout: Option<String>,
    pub file_type: Option<String>,
    pub file_path: Option<String>,
    pub storage: StorageLayer,
}

/// Storage blocks as written in a layer; more than one may be present
#[derive(Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageLayer {
    pub s3: Option<S3Layer>,
    pub azure: Option<AzureLayer>,
    pub gcp: Option<GcpLayer>,
    pub alioss: Option<AliOssLayer>,
}

#[derive(Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct S3Layer {
    pub access_key: Option<String>,
    pub secret: Option<String>,
    pub session_token: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub proxy_config: Option<ProxyConfig>,
    pub max_retries: Option<u32>,
    #[serde(deserialize_with = "duration::deserialize_optional")]
    pub max_retry_delay: Option<Duration>,
    #[serde(deserialize_with = "duration::deserialize_optional")]
    pub min_retry_delay: Option<Duration>,
    pub aws_log_level: Option<String>,
}

#[derive(Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AzureLayer {
    pub account_name: Option<String>,
    pub account_key: Option<String>,
    pub container_name: Option<String>,
}

#[derive(Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GcpLayer {
    pub credentials_json: Option<String>,
    pub bucket: Option<String>,
    pub proxy_config: Option<ProxyConfig>,
}

#[derive(Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AliOssLayer {
    pub access_key: Option<String>,
    pub secret: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
}

// ============================================================================
// Layer Sources
// ============================================================================

impl ConfigLayer {
    /// Built-in defaults, the lowest-priority layer
    pub fn defaults() -> Self {
        Self {
            livekit_host: Some(super::DEFAULT_LIVEKIT_HOST.to_string()),
            listen_port: Some(super::DEFAULT_LISTEN_PORT),
            layout: Some(super::DEFAULT_LAYOUT.to_string()),
            file_type: Some(super::DEFAULT_FILE_TYPE.to_string()),
            file_path: Some(super::DEFAULT_FILE_PATH.to_string()),
            ..Default::default()
        }
    }

    /// Parse YAML text after substituting `${VAR}` references via `lookup`.
    ///
    /// An empty document yields an empty layer.
    pub fn from_yaml<F>(text: &str, lookup: F) -> Result<Self, serde_yaml::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let expanded = expand_variables(text, lookup);
        let value: serde_yaml::Value = serde_yaml::from_str(&expanded)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_yaml::from_value(value)
    }

    /// Build the environment layer from `lookup`.
    ///
    /// Empty values count as unset. Setting any variable of a storage
    /// provider creates that provider's block.
    ///
    /// # Errors
    /// - `ConfigError::InvalidValue` when `PORT` is not a valid port number
    /// - `ConfigError::FileRead` when `GOOGLE_APPLICATION_CREDENTIALS` names a
    ///   file that cannot be read
    pub fn from_env<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let listen_port = match get(env_keys::PORT) {
            Some(raw) => Some(raw.trim().parse::<u16>().map_err(|e| {
                ConfigError::InvalidValue {
                    key: env_keys::PORT.to_string(),
                    message: format!("'{}' is not a valid port: {}", raw, e),
                }
            })?),
            None => None,
        };

        let s3 = S3Layer {
            access_key: get(env_keys::S3_ACCESS_KEY),
            secret: get(env_keys::S3_SECRET),
            session_token: get(env_keys::S3_SESSION_TOKEN),
            region: get(env_keys::S3_REGION),
            endpoint: get(env_keys::S3_ENDPOINT),
            bucket: get(env_keys::S3_BUCKET),
            ..Default::default()
        };

        let azure = AzureLayer {
            account_name: get(env_keys::AZURE_STORAGE_ACCOUNT),
            account_key: get(env_keys::AZURE_STORAGE_KEY),
            container_name: get(env_keys::AZURE_CONTAINER_NAME),
        };

        let gcp = GcpLayer {
            credentials_json: get(env_keys::GOOGLE_APPLICATION_CREDENTIALS)
                .map(|value| read_credentials(&value))
                .transpose()?,
            bucket: get(env_keys::GCP_BUCKET),
            ..Default::default()
        };

        let alioss = AliOssLayer {
            access_key: get(env_keys::ALIOSS_ACCESS_KEY),
            secret: get(env_keys::ALIOSS_SECRET),
            region: get(env_keys::ALIOSS_REGION),
            endpoint: get(env_keys::ALIOSS_ENDPOINT),
            bucket: get(env_keys::ALIOSS_BUCKET),
        };

        Ok(Self {
            livekit_host: get(env_keys::LIVEKIT_HOST),
            livekit_api_key: get(env_keys::LIVEKIT_API_KEY),
            livekit_api_secret: get(env_keys::LIVEKIT_API_SECRET),
            webhook_api_key: get(env_keys::WEBHOOK_API_KEY),
            listen_port,
            layout: get(env_keys::LAYOUT),
            file_type: get(env_keys::FILE_TYPE),
            file_path: get(env_keys::FILE_PATH),
            storage: StorageLayer {
                s3: (s3 != S3Layer::default()).then_some(s3),
                azure: (azure != AzureLayer::default()).then_some(azure),
                gcp: (gcp != GcpLayer::default()).then_some(gcp),
                alioss: (alioss != AliOssLayer::default()).then_some(alioss),
            },
        })
    }

    /// Overlay `overlay` on top of `self`; values present in `overlay` win
    pub fn merge(self, overlay: ConfigLayer) -> ConfigLayer {
        Merge::merge(self, overlay)
    }
}

/// Credentials may be given as a path to a key file or as the JSON itself
fn read_credentials(value: &str) -> Result<String, ConfigError> {
    let path = Path::new(value);
    if path.exists() {
        std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    } else {
        Ok(value.to_string())
    }
}

// ============================================================================
// Merge Implementations
// ============================================================================

impl Merge for ConfigLayer {
    fn merge(self, overlay: Self) -> Self {
        Self {
            livekit_host: overlay.livekit_host.or(self.livekit_host),
            livekit_api_key: overlay.livekit_api_key.or(self.livekit_api_key),
            livekit_api_secret: overlay.livekit_api_secret.or(self.livekit_api_secret),
            webhook_api_key: overlay.webhook_api_key.or(self.webhook_api_key),
            listen_port: overlay.listen_port.or(self.listen_port),
            layout: overlay.layout.or(self.layout),
            file_type: overlay.file_type.or(self.file_type),
            file_path: overlay.file_path.or(self.file_path),
            storage: self.storage.merge(overlay.storage),
        }
    }
}

impl Merge for StorageLayer {
    fn merge(self, overlay: Self) -> Self {
        Self {
            s3: merge_block(self.s3, overlay.s3),
            azure: merge_block(self.azure, overlay.azure),
            gcp: merge_block(self.gcp, overlay.gcp),
            alioss: merge_block(self.alioss, overlay.alioss),
        }
    }
}

impl Merge for S3Layer {
    fn merge(self, overlay: Self) -> Self {
        Self {
            access_key: overlay.access_key.or(self.access_key),
            secret: overlay.secret.or(self.secret),
            session_token: overlay.session_token.or(self.session_token),
            region: overlay.region.or(self.region),
            endpoint: overlay.endpoint.or(self.endpoint),
            bucket: overlay.bucket.or(self.bucket),
            proxy_config: overlay.proxy_config.or(self.proxy_config),
            max_retries: overlay.max_retries.or(self.max_retries),
            max_retry_delay: overlay.max_retry_delay.or(self.max_retry_delay),
            min_retry_delay: overlay.min_retry_delay.or(self.min_retry_delay),
            aws_log_level: overlay.aws_log_level.or(self.aws_log_level),
        }
    }
}

impl Merge for AzureLayer {
    fn merge(self, overlay: Self) -> Self {
        Self {
            account_name: overlay.account_name.or(self.account_name),
            account_key: overlay.account_key.or(self.account_key),
            container_name: overlay.container_name.or(self.container_name),
        }
    }
}

impl Merge for GcpLayer {
    fn merge(self, overlay: Self) -> Self {
        Self {
            credentials_json: overlay.credentials_json.or(self.credentials_json),
            bucket: overlay.bucket.or(self.bucket),
            proxy_config: overlay.proxy_config.or(self.proxy_config),
        }
    }
}

impl Merge for AliOssLayer {
    fn merge(self, overlay: Self) -> Self {
        Self {
            access_key: overlay.access_key.or(self.access_key),
            secret: overlay.secret.or(self.secret),
            region: overlay.region.or(self.region),
            endpoint: overlay.endpoint.or(self.endpoint),
            bucket: overlay.bucket.or(self.bucket),
        }
    }
}
