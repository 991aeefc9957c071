//! Deployment configuration read from the environment.
//!
//! | Variable                        | Effect                                   |
//! |---------------------------------|------------------------------------------|
//! | `AUTHSYNC_API_URL`              | API base URL                             |
//! | `AUTHSYNC_API_KEY`              | use the `x-api-key` scheme with this key |
//! | `AUTHSYNC_HANDSHAKE_TIMEOUT_MS` | handshake deadline, `0` disables it      |
//! | `AUTHSYNC_ALLOWED_ORIGINS`      | comma-separated host origin allow-list   |
//! | `AUTHSYNC_BROADCAST_CHANNEL`    | cross-tab channel name                   |
//!
//! Unset or empty variables keep their defaults.

use std::time::Duration;

use authsync_channel::{DEFAULT_CHANNEL_NAME, HandshakeConfig};
use authsync_request::{ApiConfig, CredentialScheme};

pub const API_URL_VAR: &str = "AUTHSYNC_API_URL";
pub const API_KEY_VAR: &str = "AUTHSYNC_API_KEY";
pub const HANDSHAKE_TIMEOUT_VAR: &str = "AUTHSYNC_HANDSHAKE_TIMEOUT_MS";
pub const ALLOWED_ORIGINS_VAR: &str = "AUTHSYNC_ALLOWED_ORIGINS";
pub const BROADCAST_CHANNEL_VAR: &str = "AUTHSYNC_BROADCAST_CHANNEL";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set but can't be used.
    #[error("invalid {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}

/// Everything a deployment configures. The credential scheme is fixed
/// once this is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSyncConfig {
    pub api: ApiConfig,
    pub handshake: HandshakeConfig,
    pub broadcast_channel: String,
}

impl Default for AuthSyncConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            handshake: HandshakeConfig::default(),
            broadcast_channel: DEFAULT_CHANNEL_NAME.to_string(),
        }
    }
}

impl AuthSyncConfig {
    /// Reads the process environment.
    ///
    /// # Errors
    /// `ConfigError::InvalidValue` if a set variable doesn't parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// # Errors
    /// `ConfigError::InvalidValue` if a set variable doesn't parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |var: &str| {
            lookup(var)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();

        if let Some(url) = read(API_URL_VAR) {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    var: API_URL_VAR.into(),
                    reason: format!("expected an http(s) URL, got {url:?}"),
                });
            }
            config.api.base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(key) = read(API_KEY_VAR) {
            config.api.credential_scheme = CredentialScheme::ApiKey(key);
        }

        if let Some(ms) = read(HANDSHAKE_TIMEOUT_VAR) {
            let ms: u64 = ms.parse().map_err(|_| ConfigError::InvalidValue {
                var: HANDSHAKE_TIMEOUT_VAR.into(),
                reason: format!("expected milliseconds, got {ms:?}"),
            })?;
            config.handshake.timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }

        if let Some(origins) = read(ALLOWED_ORIGINS_VAR) {
            config.handshake.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_owned)
                .collect();
        }

        if let Some(name) = read(BROADCAST_CHANNEL_VAR) {
            config.broadcast_channel = name;
        }

        tracing::debug!(
            base_url = %config.api.base_url,
            scheme = ?config.api.credential_scheme,
            timeout = ?config.handshake.timeout,
            origins = config.handshake.allowed_origins.len(),
            channel = %config.broadcast_channel,
            "loaded authsync configuration"
        );
        Ok(config)
    }
}
