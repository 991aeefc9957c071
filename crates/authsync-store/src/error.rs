//! Error types for the store layer.

use authsync_session::SessionMode;

/// Errors that can occur while building or talking to a session store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The resolved mode has no wiring, e.g. embedded mode without a
    /// handshake channel.
    #[error("no session source configured for {0} mode")]
    MissingSource(SessionMode),

    /// The store actor has stopped.
    #[error("session store has shut down")]
    Closed,

    /// The store actor panicked.
    #[error("session store actor failed: {0}")]
    Crashed(String),
}
