//! API endpoint and credential scheme.

use std::fmt;

/// Base URL used when none is configured.
pub const DEFAULT_API_URL: &str =
    "https://6q9d6sl2jh.execute-api.ap-southeast-2.amazonaws.com/api";

/// How outbound calls prove who they are. Fixed per deployment.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum CredentialScheme {
    /// `Authorization: Bearer <token>`: a fresh provider token in
    /// standalone mode, the host's token in embedded mode.
    #[default]
    Bearer,

    /// `x-api-key: <key>`: a static deployment key.
    ApiKey(String),
}

impl fmt::Debug for CredentialScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer => f.write_str("Bearer"),
            Self::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Prefix for every endpoint, without a trailing slash.
    pub base_url: String,
    pub credential_scheme: CredentialScheme,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            credential_scheme: CredentialScheme::Bearer,
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>, credential_scheme: CredentialScheme) -> Self {
        Self {
            base_url: base_url.into(),
            credential_scheme,
        }
    }
}
