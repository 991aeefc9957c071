//! Session Source Adapter: provider notifications → session events.
//!
//! [`SessionSource::subscribe`] starts a forwarding task that reads the
//! provider's change stream, resolves the claims of each signed-in user,
//! and emits one [`SourceEvent`] per change.
//!
//! Claims are resolved *inside* the task, one change at a time. A slow
//! claims lookup for an earlier sign-in therefore can't land after a later
//! sign-out. Events come out in the order the provider produced them.
//!
//! Provider failures never escape the task. They become
//! [`SourceEvent::Failed`], which the store turns into an
//! `Unauthenticated` session carrying the error message.

use std::sync::Arc;

use authsync_protocol::{Claims, PublicUser};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{AuthSession, IdentityProvider, ProviderChange, SessionError, SessionMode};

/// What the provider said, after interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// A user with a tenant claim signed in.
    SignedIn {
        user: PublicUser,
        claims: Arc<Claims>,
    },

    /// Nobody is signed in, or the signed-in user has no tenant claim.
    SignedOut,

    /// The provider failed.
    Failed(SessionError),
}

impl SourceEvent {
    /// Builds the full replacement session for this event.
    pub fn into_session(self) -> AuthSession {
        match self {
            Self::SignedIn { user, claims } => AuthSession::signed_in(user, claims),
            Self::SignedOut => AuthSession::signed_out(SessionMode::Standalone),
            Self::Failed(err) => AuthSession::failed(SessionMode::Standalone, err),
        }
    }
}

/// Wraps an [`IdentityProvider`] for consumption by the store.
pub struct SessionSource<P: IdentityProvider> {
    provider: Arc<P>,
}

impl<P: IdentityProvider> Clone for SessionSource<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
        }
    }
}

impl<P: IdentityProvider> SessionSource<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// The wrapped provider, e.g. to hand to a request builder as its
    /// token source.
    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Subscribes to the provider.
    ///
    /// Must be called inside a Tokio runtime. Dropping the returned
    /// subscription unsubscribes.
    pub fn subscribe(&self) -> SourceSubscription {
        let mut changes = self.provider.subscribe();
        let provider = Arc::clone(&self.provider);
        let (tx, rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            while let Some(change) = changes.recv().await {
                let event = resolve(provider.as_ref(), change).await;
                if tx.send(event).is_err() {
                    break;
                }
            }
            tracing::debug!("identity provider change stream ended");
        });

        SourceSubscription { rx, task }
    }
}

async fn resolve<P: IdentityProvider>(
    provider: &P,
    change: ProviderChange,
) -> SourceEvent {
    let user = match change {
        Ok(Some(user)) => user,
        Ok(None) => return SourceEvent::SignedOut,
        Err(err) => {
            tracing::warn!(error = %err, "identity provider reported an error");
            return SourceEvent::Failed(err);
        }
    };

    match provider.claims(&user).await {
        Ok(claims) if claims.has_tenant() => SourceEvent::SignedIn {
            user,
            claims: Arc::new(claims),
        },
        Ok(_) => {
            tracing::warn!(
                uid = %user.uid,
                "identity has no tenant claim, treating as signed out"
            );
            SourceEvent::SignedOut
        }
        Err(err) => {
            tracing::warn!(uid = %user.uid, error = %err, "claims lookup failed");
            SourceEvent::Failed(err)
        }
    }
}

/// A live provider subscription. Dropping it aborts the forwarding task,
/// which releases the provider's receiver.
pub struct SourceSubscription {
    rx: mpsc::UnboundedReceiver<SourceEvent>,
    task: JoinHandle<()>,
}

impl SourceSubscription {
    /// Next event, or `None` once the provider's stream has ended.
    pub async fn recv(&mut self) -> Option<SourceEvent> {
        self.rx.recv().await
    }
}

impl Drop for SourceSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
