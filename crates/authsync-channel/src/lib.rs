//! The two message channels a session store listens to.
//!
//! - [`handshake`]: a guest frame asks its host for credentials
//!   (`IFRAME_READY` → `AUTH_DATA`). Embedded mode only.
//! - [`broadcast`]: same-origin tabs mirror each other's session
//!   (`AUTH_STATE_CHANGED`). Standalone mode only.
//!
//! Both run over any [`Connection`](authsync_transport::Connection) and
//! both hand out subscriptions whose `Drop` stops the listener task.

pub mod broadcast;
mod error;
pub mod handshake;

pub use broadcast::{BroadcastSubscription, CrossTabBroadcast, DEFAULT_CHANNEL_NAME};
pub use error::ChannelError;
pub use handshake::{
    DEFAULT_HANDSHAKE_TIMEOUT, HandshakeChannel, HandshakeConfig, HandshakeEvent,
    HandshakeState, HandshakeSubscription, HostCredentials,
};
