//! Embedded handshake: how a guest frame gets its credentials.
//!
//! The flow is:
//!   1. Guest sends `IFRAME_READY` to the host (exactly once per activation)
//!   2. Host answers, whenever it is ready, with `AUTH_DATA`
//!   3. Every well-formed `AUTH_DATA` becomes a [`HandshakeEvent::Credentials`];
//!      later ones replace earlier ones (host-driven refresh)
//!
//! ```text
//! AwaitingHost ──AUTH_DATA──→ Ready ──AUTH_DATA──→ Ready
//!      │                        ▲
//!      └──deadline──→ TimedOut ─┘ (a late AUTH_DATA still counts)
//!
//! any state ──host link ends──→ Closed
//! ```
//!
//! The guest's own storage and provider are never consulted.

use std::sync::Arc;
use std::time::Duration;

use authsync_protocol::{AuthToken, Codec, HandshakeMessage, JsonCodec};
use authsync_transport::Connection;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::ChannelError;

/// How long a guest waits for `AUTH_DATA` unless configured otherwise.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// HandshakeConfig
// ---------------------------------------------------------------------------

/// Tunables for one guest frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeConfig {
    /// Deadline for the first `AUTH_DATA`. `None` waits forever.
    pub timeout: Option<Duration>,

    /// Host origins whose `AUTH_DATA` is accepted. Empty trusts every
    /// origin.
    pub allowed_origins: Vec<String>,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_HANDSHAKE_TIMEOUT),
            allowed_origins: Vec::new(),
        }
    }
}

impl HandshakeConfig {
    /// Returns `true` if a message from `origin` may carry credentials.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        if self.allowed_origins.is_empty() {
            return true;
        }
        let Some(origin) = origin else {
            return false;
        };
        let origin = origin.trim_end_matches('/');
        self.allowed_origins
            .iter()
            .any(|allowed| allowed.trim_end_matches('/') == origin)
    }
}

// ---------------------------------------------------------------------------
// State and events
// ---------------------------------------------------------------------------

/// Where one activation of the handshake stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    AwaitingHost,
    Ready,
    TimedOut,
    Closed,
}

impl std::fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitingHost => "awaiting-host",
            Self::Ready => "ready",
            Self::TimedOut => "timed-out",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Credentials handed over by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCredentials {
    pub token: AuthToken,
    pub tenant_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeEvent {
    /// A well-formed `AUTH_DATA` arrived. Replaces any earlier credentials.
    Credentials(HostCredentials),

    /// The deadline passed without any `AUTH_DATA`. The listener keeps
    /// running, so a late answer is still delivered.
    TimedOut,

    /// The host link ended. No further events follow.
    Closed,
}

// ---------------------------------------------------------------------------
// HandshakeChannel
// ---------------------------------------------------------------------------

/// Guest side of the host handshake, over any [`Connection`].
pub struct HandshakeChannel<C: Connection, K: Codec = JsonCodec> {
    host: Arc<C>,
    codec: Arc<K>,
    config: HandshakeConfig,
}

impl<C: Connection> HandshakeChannel<C> {
    pub fn new(host: Arc<C>, config: HandshakeConfig) -> Self {
        Self::with_codec(host, JsonCodec, config)
    }
}

impl<C: Connection, K: Codec> HandshakeChannel<C, K> {
    pub fn with_codec(host: Arc<C>, codec: K, config: HandshakeConfig) -> Self {
        Self {
            host,
            codec: Arc::new(codec),
            config,
        }
    }

    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    /// Sends `IFRAME_READY` and starts listening for the host's answer.
    ///
    /// Consumes the channel, so one channel value is activated at most
    /// once and therefore signals ready at most once. Dropping the
    /// returned subscription removes the listener.
    ///
    /// # Errors
    /// `ChannelError::Transport` if the ready signal can't be sent.
    pub async fn activate(self) -> Result<HandshakeSubscription, ChannelError> {
        let host_id = self.host.id();
        if self.config.allowed_origins.is_empty() {
            tracing::warn!(
                %host_id,
                "handshake origin allow-list is empty, AUTH_DATA from any origin is accepted; \
                 configure allowed origins for production deployments"
            );
        }

        let ready = self.codec.encode(&HandshakeMessage::IframeReady)?;
        self.host
            .send(&ready)
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        tracing::debug!(%host_id, "sent IFRAME_READY");

        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(HandshakeState::AwaitingHost);
        let listener = Listener {
            host: self.host,
            codec: self.codec,
            config: self.config,
            events: tx,
            state: state_tx,
        };
        let task = tokio::spawn(listener.run());

        Ok(HandshakeSubscription {
            rx,
            state: state_rx,
            task,
        })
    }
}

// ---------------------------------------------------------------------------
// Listener task
// ---------------------------------------------------------------------------

struct Listener<C: Connection, K: Codec> {
    host: Arc<C>,
    codec: Arc<K>,
    config: HandshakeConfig,
    events: mpsc::UnboundedSender<HandshakeEvent>,
    state: watch::Sender<HandshakeState>,
}

impl<C: Connection, K: Codec> Listener<C, K> {
    async fn run(self) {
        let host_id = self.host.id();
        let deadline = self.config.timeout.map(|t| Instant::now() + t);

        loop {
            let awaiting = *self.state.borrow() == HandshakeState::AwaitingHost;
            let received = match deadline {
                Some(deadline) if awaiting => {
                    match tokio::time::timeout_at(deadline, self.host.recv()).await {
                        Ok(received) => received,
                        Err(_) => {
                            tracing::warn!(%host_id, "handshake timed out waiting for AUTH_DATA");
                            self.state.send_replace(HandshakeState::TimedOut);
                            if self.events.send(HandshakeEvent::TimedOut).is_err() {
                                return;
                            }
                            continue;
                        }
                    }
                }
                _ => self.host.recv().await,
            };

            let data = match received {
                Ok(Some(data)) => data,
                Ok(None) => {
                    tracing::info!(%host_id, "host link closed");
                    break;
                }
                Err(e) => {
                    tracing::warn!(%host_id, error = %e, "host link failed");
                    break;
                }
            };

            if let Some(credentials) = self.interpret(&data) {
                if !self.deliver(credentials) {
                    return;
                }
            }
        }

        self.state.send_replace(HandshakeState::Closed);
        let _ = self.events.send(HandshakeEvent::Closed);
    }

    /// Decodes one inbound frame. Anything that isn't an acceptable
    /// `AUTH_DATA` is logged and dropped.
    fn interpret(&self, data: &[u8]) -> Option<HostCredentials> {
        let host_id = self.host.id();
        let msg: HandshakeMessage = match self.codec.decode(data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%host_id, error = %e, "ignoring undecodable host message");
                return None;
            }
        };

        if !matches!(msg, HandshakeMessage::AuthData { .. }) {
            tracing::debug!(%host_id, "ignoring non-AUTH_DATA host message");
            return None;
        }

        let origin = self.host.origin();
        if !self.config.origin_allowed(origin) {
            tracing::warn!(
                %host_id,
                origin = origin.unwrap_or("<unknown>"),
                "AUTH_DATA from origin outside the allow-list, ignoring"
            );
            return None;
        }

        if let Err(e) = msg.validate() {
            tracing::debug!(%host_id, error = %e, "ignoring malformed AUTH_DATA");
            return None;
        }

        match msg {
            HandshakeMessage::AuthData {
                auth_token,
                tenant_name,
            } => Some(HostCredentials {
                token: auth_token,
                tenant_name,
            }),
            HandshakeMessage::IframeReady => None,
        }
    }

    /// Returns `false` once nobody is listening any more.
    fn deliver(&self, credentials: HostCredentials) -> bool {
        tracing::info!(
            host_id = %self.host.id(),
            tenant = %credentials.tenant_name,
            "received host credentials"
        );
        self.state.send_replace(HandshakeState::Ready);
        self.events
            .send(HandshakeEvent::Credentials(credentials))
            .is_ok()
    }
}

// ---------------------------------------------------------------------------
// HandshakeSubscription
// ---------------------------------------------------------------------------

/// A running handshake listener. Dropping it removes the listener.
pub struct HandshakeSubscription {
    rx: mpsc::UnboundedReceiver<HandshakeEvent>,
    state: watch::Receiver<HandshakeState>,
    task: JoinHandle<()>,
}

impl HandshakeSubscription {
    /// Next event, or `None` after [`HandshakeEvent::Closed`].
    pub async fn recv(&mut self) -> Option<HandshakeEvent> {
        self.rx.recv().await
    }

    pub fn state(&self) -> HandshakeState {
        *self.state.borrow()
    }

    /// Waits for the first credentials.
    ///
    /// # Errors
    /// - `ChannelError::HandshakeTimeout` if the deadline passes first
    /// - `ChannelError::HostClosed` if the host link ends first
    pub async fn credentials(&mut self) -> Result<HostCredentials, ChannelError> {
        match self.recv().await {
            Some(HandshakeEvent::Credentials(credentials)) => Ok(credentials),
            Some(HandshakeEvent::TimedOut) => Err(ChannelError::HandshakeTimeout),
            Some(HandshakeEvent::Closed) | None => Err(ChannelError::HostClosed),
        }
    }
}

impl Drop for HandshakeSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
