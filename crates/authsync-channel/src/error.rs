//! Error types for the handshake and broadcast channels.

use authsync_protocol::ProtocolError;

/// Errors raised by [`HandshakeChannel`](crate::HandshakeChannel) and
/// [`CrossTabBroadcast`](crate::CrossTabBroadcast).
///
/// Only the *outbound* side can fail this way. Inbound messages that don't
/// decode are logged and skipped by the listeners instead.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The host didn't answer `IFRAME_READY` with `AUTH_DATA` in time.
    #[error("host did not send AUTH_DATA before the handshake deadline")]
    HandshakeTimeout,

    /// The host link ended before any credentials arrived.
    #[error("host connection closed before credentials arrived")]
    HostClosed,

    /// A message could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The underlying connection refused a send.
    #[error("transport error: {0}")]
    Transport(String),
}
