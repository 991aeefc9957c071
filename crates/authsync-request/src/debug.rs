//! Non-sensitive diagnostics attached to every request outcome.

use std::collections::BTreeMap;

use reqwest::header::HeaderMap;
use serde::Serialize;

/// Replaces the value of every credential header.
pub const REDACTED: &str = "[REDACTED]";

/// Header names whose values never leave [`DebugRecord`] unredacted.
const CREDENTIAL_HEADERS: [&str; 2] = ["authorization", "x-api-key"];

/// What was sent, and what went wrong, minus the credentials.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DebugRecord {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DebugRecord {
    /// A record for a request that never got as far as having headers.
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Captures `headers`, redacting credentials.
    pub fn capture(url: impl Into<String>, headers: &HeaderMap) -> Self {
        let headers = headers
            .iter()
            .map(|(name, value)| {
                let name = name.as_str().to_string();
                let value = if is_credential(&name) {
                    REDACTED.to_string()
                } else {
                    String::from_utf8_lossy(value.as_bytes()).into_owned()
                };
                (name, value)
            })
            .collect();
        Self {
            url: url.into(),
            headers,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

fn is_credential(name: &str) -> bool {
    CREDENTIAL_HEADERS
        .iter()
        .any(|credential| credential.eq_ignore_ascii_case(name))
}
