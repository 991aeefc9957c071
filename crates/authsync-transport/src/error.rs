//! Errors raised by host links and tab buses.

/// Why a [`Connection`](crate::Connection) or
/// [`Transport`](crate::Transport) call failed.
///
/// In-process links only ever report
/// [`ConnectionClosed`](Self::ConnectionClosed); the I/O variants come from
/// the WebSocket transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer is gone: the host hung up, the guest dropped its end, or
    /// the bus port was closed.
    #[error("link closed: {0}")]
    ConnectionClosed(String),

    /// A frame could not be written to the peer.
    #[error("could not deliver frame: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading the next frame failed mid-stream.
    #[error("could not read frame: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The host could not bind its listener, or a guest could not reach
    /// its host.
    #[error("could not reach peer: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// An incoming guest failed the WebSocket upgrade.
    #[error("guest upgrade failed: {0}")]
    AcceptFailed(#[source] std::io::Error),
}
