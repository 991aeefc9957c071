//! Error types for the session layer.

/// Errors raised by an identity provider or while interpreting what it
/// returned.
///
/// `Clone` because the same error is both delivered to the store (which
/// keeps its message in `AuthSession::last_error`) and, in tests,
/// replayed by the mock provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The provider's change stream or a provider call failed.
    #[error("identity provider error: {0}")]
    Provider(String),

    /// The provider returned claims that could not be decoded.
    #[error("malformed claims: {0}")]
    ClaimsDecode(String),

    /// The provider could not issue a token for the current user.
    #[error("no token available: {0}")]
    TokenUnavailable(String),
}

impl From<authsync_protocol::ProtocolError> for SessionError {
    fn from(err: authsync_protocol::ProtocolError) -> Self {
        Self::ClaimsDecode(err.to_string())
    }
}
