//! Unified error type for authsync.

use authsync_channel::ChannelError;
use authsync_protocol::ProtocolError;
use authsync_request::RequestError;
use authsync_session::SessionError;
use authsync_store::StoreError;
use authsync_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps every crate-specific error.
///
/// Applications built on the `authsync` facade handle this one type; the
/// `#[from]` conversions let `?` lift sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum AuthSyncError {
    /// Connection failures (bind, connect, send, receive).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Malformed or invalid wire messages.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Identity provider, claims, or token failures.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Handshake deadline, host close, or channel send failures.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Store construction or lifecycle failures.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Failed API calls. The debug record is available via
    /// [`RequestError::debug`].
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Invalid environment configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
