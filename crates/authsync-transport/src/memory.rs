//! In-process transports.
//!
//! [`MemoryConnection`] links exactly two peers (a host frame and its
//! guest). [`MemoryBus`] links any number of same-origin tabs: every
//! message posted by one [`BusPort`] is delivered to every *other* port,
//! mirroring how a browser broadcast channel behaves.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, mpsc, watch};

use crate::{Connection, ConnectionId, TransportError, next_connection_id};

/// Default number of undelivered frames a bus keeps per port.
const DEFAULT_BUS_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// MemoryConnection
// ---------------------------------------------------------------------------

/// One end of an in-process, bidirectional link.
pub struct MemoryConnection {
    id: ConnectionId,
    peer_origin: String,
    tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl MemoryConnection {
    /// Creates a connected pair.
    ///
    /// `first_origin` is the origin of the first end and `second_origin`
    /// the origin of the second; each end reports its *peer's* origin, so
    /// `pair("https://host", "https://guest").1.origin()` is
    /// `Some("https://host")`.
    pub fn pair(
        first_origin: impl Into<String>,
        second_origin: impl Into<String>,
    ) -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();

        let first = Self {
            id: next_connection_id(),
            peer_origin: second_origin.into(),
            tx: Mutex::new(Some(b_tx)),
            rx: Mutex::new(a_rx),
        };
        let second = Self {
            id: next_connection_id(),
            peer_origin: first_origin.into(),
            tx: Mutex::new(Some(a_tx)),
            rx: Mutex::new(b_rx),
        };
        (first, second)
    }
}

impl Connection for MemoryConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let tx = self.tx.lock().await;
        let tx = tx.as_ref().ok_or_else(|| {
            TransportError::ConnectionClosed("closed locally".into())
        })?;
        tx.send(data.to_vec()).map_err(|_| {
            TransportError::ConnectionClosed("peer dropped".into())
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.rx.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        // Dropping our sender ends the peer's receive stream.
        self.tx.lock().await.take();
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn origin(&self) -> Option<&str> {
        Some(&self.peer_origin)
    }
}

// ---------------------------------------------------------------------------
// MemoryBus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct BusFrame {
    from: ConnectionId,
    data: Arc<[u8]>,
}

/// A named, same-origin publish/subscribe bus.
///
/// Cloning the bus is cheap; every clone feeds the same set of ports.
#[derive(Clone)]
pub struct MemoryBus {
    name: Arc<str>,
    origin: Arc<str>,
    tx: broadcast::Sender<BusFrame>,
}

impl MemoryBus {
    /// Creates a bus with the default per-port backlog.
    pub fn new(name: &str, origin: &str) -> Self {
        Self::with_capacity(name, origin, DEFAULT_BUS_CAPACITY)
    }

    /// Creates a bus that keeps at most `capacity` undelivered frames per
    /// port. Slower ports skip the oldest frames.
    pub fn with_capacity(name: &str, origin: &str, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            name: name.into(),
            origin: origin.into(),
            tx,
        }
    }

    /// The channel name this bus was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The origin every port on this bus shares.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Opens a new port (one per tab).
    pub fn join(&self) -> BusPort {
        let id = next_connection_id();
        tracing::debug!(%id, bus = %self.name, "bus port opened");
        BusPort {
            id,
            origin: Arc::clone(&self.origin),
            tx: self.tx.clone(),
            rx: Mutex::new(self.tx.subscribe()),
            closed: watch::Sender::new(false),
        }
    }

    /// Number of ports currently attached.
    pub fn port_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// One tab's attachment to a [`MemoryBus`].
pub struct BusPort {
    id: ConnectionId,
    origin: Arc<str>,
    tx: broadcast::Sender<BusFrame>,
    rx: Mutex<broadcast::Receiver<BusFrame>>,
    /// Flips to `true` once; wakes a parked `recv`.
    closed: watch::Sender<bool>,
}

impl Connection for BusPort {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        if *self.closed.borrow() {
            return Err(TransportError::ConnectionClosed(
                "port closed".into(),
            ));
        }
        let frame = BusFrame {
            from: self.id,
            data: data.into(),
        };
        // Our own receiver keeps the channel open, so this only fails if
        // the port is being torn down concurrently.
        let _ = self.tx.send(frame);
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut closed = self.closed.subscribe();
        let mut rx = self.rx.lock().await;
        loop {
            let next = tokio::select! {
                biased;
                _ = closed.wait_for(|closed| *closed) => return Ok(None),
                next = rx.recv() => next,
            };
            match next {
                Ok(frame) if frame.from == self.id => continue,
                Ok(frame) => return Ok(Some(frame.data.to_vec())),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        id = %self.id,
                        skipped,
                        "bus port lagged, oldest frames dropped"
                    );
                }
                Err(RecvError::Closed) => return Ok(None),
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.closed.send_replace(true);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn origin(&self) -> Option<&str> {
        Some(&self.origin)
    }
}
