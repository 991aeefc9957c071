//! Session store actor: one Tokio task that owns the canonical session.
//!
//! Every input (provider notifications, sibling-tab broadcasts, host
//! handshake events) is consumed by the actor, turned into a complete
//! [`AuthSession`], and published with a single `send_replace`. Readers
//! hold [`SessionWatch`]es and only ever see whole sessions.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use authsync_channel::{
    BroadcastSubscription, ChannelError, CrossTabBroadcast, HandshakeChannel, HandshakeEvent,
    HandshakeSubscription,
};
use authsync_protocol::Codec;
use authsync_session::{
    AuthSession, IdentityProvider, SessionError, SessionMode, SessionSource, SourceEvent,
    SourceSubscription,
};
use authsync_transport::Connection;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::{FrameContext, SessionWatch, StoreError, resolve_mode};

/// Command channel size for the store actor.
const COMMAND_CHANNEL_SIZE: usize = 8;

type SourceLauncher = Box<dyn FnOnce() -> SourceSubscription + Send>;
type BroadcastLauncher = Box<dyn FnOnce() -> BroadcastLink + Send>;
type HandshakeLaunch =
    Pin<Box<dyn Future<Output = Result<HandshakeSubscription, ChannelError>> + Send>>;

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Configures and starts a [`SessionStore`].
///
/// Both the standalone and the embedded wiring may be supplied; only the
/// one matching the resolved mode is started; the other is dropped
/// without ever being activated.
///
/// ```rust,no_run
/// # async fn example(
/// #     provider: std::sync::Arc<impl authsync_session::IdentityProvider>,
/// #     port: std::sync::Arc<authsync_transport::BusPort>,
/// # ) -> Result<(), authsync_store::StoreError> {
/// use authsync_channel::CrossTabBroadcast;
/// use authsync_session::SessionSource;
/// use authsync_store::SessionStore;
///
/// let store = SessionStore::builder()
///     .standalone(SessionSource::new(provider))
///     .broadcast(CrossTabBroadcast::new(port))
///     .build()?;
///
/// let session = store.wait_resolved().await?;
/// println!("{}", session.status());
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SessionStoreBuilder {
    mode: Option<SessionMode>,
    frame: FrameContext,
    source: Option<SourceLauncher>,
    broadcast: Option<BroadcastLauncher>,
    handshake: Option<HandshakeLaunch>,
}

impl SessionStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces the mode instead of deriving it from the frame context.
    pub fn mode(mut self, mode: SessionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// How the application was loaded. Defaults to
    /// [`FrameContext::TopLevel`].
    pub fn frame(mut self, frame: FrameContext) -> Self {
        self.frame = frame;
        self
    }

    /// Standalone wiring: the tab's own identity provider.
    pub fn standalone<P: IdentityProvider>(mut self, source: SessionSource<P>) -> Self {
        self.source = Some(Box::new(move || source.subscribe()));
        self
    }

    /// Standalone wiring: the same-origin broadcast channel. Optional.
    pub fn broadcast<C: Connection, K: Codec>(mut self, broadcast: CrossTabBroadcast<C, K>) -> Self {
        self.broadcast = Some(Box::new(move || BroadcastLink::start(broadcast)));
        self
    }

    /// Embedded wiring: the host handshake.
    pub fn embedded<C: Connection, K: Codec>(mut self, handshake: HandshakeChannel<C, K>) -> Self {
        self.handshake = Some(Box::pin(handshake.activate()));
        self
    }

    /// Resolves the mode and spawns the store actor.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    /// `StoreError::MissingSource` if the resolved mode has no wiring.
    pub fn build(self) -> Result<SessionStore, StoreError> {
        let mode = resolve_mode(self.mode, self.frame);
        let inputs = match mode {
            SessionMode::Standalone => {
                let source = self.source.ok_or(StoreError::MissingSource(mode))?;
                if self.handshake.is_some() {
                    tracing::debug!("standalone mode, handshake wiring left unstarted");
                }
                Inputs::Standalone {
                    source,
                    broadcast: self.broadcast,
                }
            }
            SessionMode::Embedded => {
                let handshake = self.handshake.ok_or(StoreError::MissingSource(mode))?;
                if self.source.is_some() || self.broadcast.is_some() {
                    tracing::debug!("embedded mode, provider and broadcast wiring left unstarted");
                }
                Inputs::Embedded { handshake }
            }
        };
        Ok(spawn_store(mode, inputs))
    }
}

enum Inputs {
    Standalone {
        source: SourceLauncher,
        broadcast: Option<BroadcastLauncher>,
    },
    Embedded {
        handshake: HandshakeLaunch,
    },
}

// ---------------------------------------------------------------------------
// BroadcastLink
// ---------------------------------------------------------------------------

/// A started broadcast: the listener plus a publisher task fed by the
/// actor.
struct BroadcastLink {
    subscription: BroadcastSubscription,
    publisher: Option<mpsc::UnboundedSender<Arc<AuthSession>>>,
    task: JoinHandle<()>,
}

impl BroadcastLink {
    fn start<C: Connection, K: Codec>(broadcast: CrossTabBroadcast<C, K>) -> Self {
        let broadcast = Arc::new(broadcast);
        let subscription = broadcast.subscribe();
        let (tx, mut rx) = mpsc::unbounded_channel::<Arc<AuthSession>>();

        let task = tokio::spawn(async move {
            while let Some(session) = rx.recv().await {
                if let Err(e) = broadcast.publish(&session).await {
                    tracing::warn!(error = %e, "failed to publish session to other tabs");
                }
            }
        });

        Self {
            subscription,
            publisher: Some(tx),
            task,
        }
    }

    fn publish(&self, session: Arc<AuthSession>) {
        if let Some(publisher) = &self.publisher {
            let _ = publisher.send(session);
        }
    }

    /// Lets queued publishes go out, then stops.
    async fn finish(mut self) {
        self.publisher.take();
        let _ = (&mut self.task).await;
    }
}

impl Drop for BroadcastLink {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// Commands sent to the store actor.
pub(crate) enum StoreCommand {
    Shutdown,
}

/// Handle to a running store.
///
/// Dropping the handle aborts the actor, which releases every
/// subscription it holds. [`shutdown`](Self::shutdown) does the same but
/// waits for queued broadcast publishes first.
pub struct SessionStore {
    mode: SessionMode,
    state: watch::Receiver<Arc<AuthSession>>,
    commands: mpsc::Sender<StoreCommand>,
    task: Option<JoinHandle<()>>,
}

impl SessionStore {
    pub fn builder() -> SessionStoreBuilder {
        SessionStoreBuilder::new()
    }

    /// Fixed at construction.
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn subscribe(&self) -> SessionWatch {
        SessionWatch::new(self.state.clone())
    }

    pub fn snapshot(&self) -> Arc<AuthSession> {
        Arc::clone(&self.state.borrow())
    }

    /// Waits for the first resolution. Dependent work should not start
    /// before this returns.
    ///
    /// # Errors
    /// `StoreError::Closed` if the store stops first.
    pub async fn wait_resolved(&self) -> Result<Arc<AuthSession>, StoreError> {
        self.subscribe().wait_resolved().await
    }

    /// Stops the actor and waits for it to finish.
    ///
    /// # Errors
    /// `StoreError::Crashed` if the actor had panicked.
    pub async fn shutdown(mut self) -> Result<(), StoreError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        let _ = self.commands.send(StoreCommand::Shutdown).await;
        match task.await {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(StoreError::Crashed(e.to_string())),
        }
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn spawn_store(mode: SessionMode, inputs: Inputs) -> SessionStore {
    let (state_tx, state_rx) = watch::channel(Arc::new(AuthSession::loading(mode)));
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);

    let actor = StoreActor {
        mode,
        state: state_tx,
        commands: cmd_rx,
    };
    let task = tokio::spawn(actor.run(inputs));

    SessionStore {
        mode,
        state: state_rx,
        commands: cmd_tx,
        task: Some(task),
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct StoreActor {
    mode: SessionMode,
    state: watch::Sender<Arc<AuthSession>>,
    commands: mpsc::Receiver<StoreCommand>,
}

impl StoreActor {
    async fn run(self, inputs: Inputs) {
        tracing::info!(mode = %self.mode, "session store started");
        match inputs {
            Inputs::Standalone { source, broadcast } => {
                self.run_standalone(source(), broadcast.map(|start| start()))
                    .await;
            }
            Inputs::Embedded { handshake } => self.run_embedded(handshake).await,
        }
        tracing::info!("session store stopped");
    }

    async fn run_standalone(
        mut self,
        mut source: SourceSubscription,
        mut link: Option<BroadcastLink>,
    ) {
        let mut source_open = true;
        let mut broadcast_open = link.is_some();

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(StoreCommand::Shutdown) | None => break,
                },
                event = source.recv(), if source_open => match event {
                    Some(event) => {
                        // Provider failures downgrade this tab only.
                        let shareable = !matches!(event, SourceEvent::Failed(_));
                        let session = self.apply(event.into_session());
                        if let (true, Some(link)) = (shareable, &link) {
                            link.publish(session);
                        }
                    }
                    None => {
                        source_open = false;
                        tracing::warn!("identity provider stream ended");
                        self.fail_if_loading(SessionError::Provider("change stream ended".into()));
                    }
                },
                mirrored = recv_mirrored(&mut link), if broadcast_open => match mirrored {
                    Some(session) => {
                        self.apply(session);
                    }
                    None => {
                        broadcast_open = false;
                        tracing::debug!("broadcast channel closed");
                    }
                },
            }
        }

        // Stop the provider subscription before flushing outbound messages.
        drop(source);
        if let Some(link) = link {
            link.finish().await;
        }
    }

    async fn run_embedded(mut self, handshake: HandshakeLaunch) {
        let activated = tokio::select! {
            result = handshake => result,
            _ = self.commands.recv() => return,
        };

        let mut handshake = match activated {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                tracing::warn!(error = %e, "handshake activation failed");
                self.fail_if_loading(e);
                None
            }
        };

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(StoreCommand::Shutdown) | None => break,
                },
                event = recv_handshake(&mut handshake), if handshake.is_some() => match event {
                    Some(HandshakeEvent::Credentials(credentials)) => {
                        self.apply(AuthSession::embedded(credentials.token, credentials.tenant_name));
                    }
                    Some(HandshakeEvent::TimedOut) => {
                        self.fail_if_loading(ChannelError::HandshakeTimeout);
                    }
                    Some(HandshakeEvent::Closed) | None => {
                        handshake = None;
                        self.fail_if_loading(ChannelError::HostClosed);
                    }
                },
            }
        }
    }

    /// Replaces the canonical session in one step.
    fn apply(&self, session: AuthSession) -> Arc<AuthSession> {
        tracing::info!(
            mode = %self.mode,
            status = %session.status(),
            tenant = session.tenant().map(|t| t.name.as_str()).unwrap_or("-"),
            "session updated"
        );
        let session = Arc::new(session);
        self.state.send_replace(Arc::clone(&session));
        session
    }

    /// Resolves a still-loading session to `Unauthenticated`. A session
    /// that already resolved is left alone.
    fn fail_if_loading(&self, error: impl std::fmt::Display) {
        if self.state.borrow().is_resolved() {
            return;
        }
        self.apply(AuthSession::failed(self.mode, error));
    }
}

async fn recv_mirrored(link: &mut Option<BroadcastLink>) -> Option<AuthSession> {
    match link {
        Some(link) => link.subscription.recv().await,
        None => std::future::pending().await,
    }
}

async fn recv_handshake(handshake: &mut Option<HandshakeSubscription>) -> Option<HandshakeEvent> {
    match handshake {
        Some(handshake) => handshake.recv().await,
        None => std::future::pending().await,
    }
}
