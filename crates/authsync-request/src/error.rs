//! Error types for the request builder.
//!
//! Every variant carries the [`DebugRecord`] of the failed call so callers
//! can show what was attempted without ever seeing a credential.

use crate::DebugRecord;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The session can't scope a request (no tenant), or the request
    /// itself is malformed. Raised before any token fetch.
    #[error("configuration error: {message}")]
    Configuration { message: String, debug: DebugRecord },

    /// No credential available for this call.
    #[error("credential error: {message}")]
    Credential { message: String, debug: DebugRecord },

    /// The request never got a response.
    #[error("network error: {source}")]
    Network {
        #[source]
        source: reqwest::Error,
        debug: DebugRecord,
    },

    /// The API answered with a non-success status.
    #[error("{message}")]
    Api {
        status: u16,
        message: String,
        debug: DebugRecord,
    },

    /// The response body wasn't the JSON we expected.
    #[error("decode error: {source}")]
    Decode {
        #[source]
        source: reqwest::Error,
        debug: DebugRecord,
    },

    /// The session store shut down while the call was in flight.
    #[error("request cancelled: session store shut down")]
    Cancelled { debug: DebugRecord },
}

impl RequestError {
    /// Diagnostics of the failed call, credentials redacted.
    pub fn debug(&self) -> &DebugRecord {
        match self {
            Self::Configuration { debug, .. }
            | Self::Credential { debug, .. }
            | Self::Network { debug, .. }
            | Self::Api { debug, .. }
            | Self::Decode { debug, .. }
            | Self::Cancelled { debug } => debug,
        }
    }

    pub(crate) fn configuration(message: impl Into<String>, debug: DebugRecord) -> Self {
        let message = message.into();
        Self::Configuration {
            debug: debug.with_error(message.clone()),
            message,
        }
    }

    pub(crate) fn credential(message: impl Into<String>, debug: DebugRecord) -> Self {
        let message = message.into();
        Self::Credential {
            debug: debug.with_error(message.clone()),
            message,
        }
    }
}
