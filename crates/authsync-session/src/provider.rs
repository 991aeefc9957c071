//! The identity-provider seam.
//!
//! authsync doesn't talk to any particular identity service. Whatever the
//! application uses (a hosted auth SDK, a custom OIDC client, …) is wrapped
//! in an [`IdentityProvider`]: a change stream of signed-in users, a way to
//! read a user's decoded claims, and (through [`TokenSource`]) a way to mint
//! a fresh ID token for an outbound call.
//!
//! Keeping this a trait means there is no hidden global provider handle:
//! production code injects the real one, tests inject
//! [`MockIdentityProvider`](crate::MockIdentityProvider).

use std::future::Future;

use authsync_protocol::{Claims, PublicUser};
use tokio::sync::mpsc;

use crate::SessionError;

/// One notification from the provider's change stream.
///
/// - `Ok(Some(user))`: a user is signed in
/// - `Ok(None)`: nobody is signed in
/// - `Err(_)`: the provider failed
pub type ProviderChange = Result<Option<PublicUser>, SessionError>;

/// Issues bearer tokens for outbound requests.
pub trait TokenSource: Send + Sync + 'static {
    /// Returns a freshly issued token for the current user, or `Ok(None)`
    /// when nobody is signed in.
    ///
    /// Callers must not cache the result: the provider rotates tokens and
    /// is the only one who knows when.
    fn fresh_token(
        &self,
    ) -> impl Future<Output = Result<Option<String>, SessionError>> + Send;
}

/// An external, trusted identity service.
///
/// # Example
///
/// ```rust
/// use authsync_protocol::{Claims, PublicUser};
/// use authsync_session::{IdentityProvider, ProviderChange, SessionError, TokenSource};
/// use tokio::sync::mpsc;
///
/// /// A provider with one permanently signed-in user.
/// struct StaticProvider;
///
/// impl TokenSource for StaticProvider {
///     async fn fresh_token(&self) -> Result<Option<String>, SessionError> {
///         Ok(Some("static-token".into()))
///     }
/// }
///
/// impl IdentityProvider for StaticProvider {
///     fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderChange> {
///         let (tx, rx) = mpsc::unbounded_channel();
///         let _ = tx.send(Ok(Some(PublicUser::new("uid-1"))));
///         rx
///     }
///
///     async fn claims(&self, _user: &PublicUser) -> Result<Claims, SessionError> {
///         Ok(Claims::default())
///     }
/// }
/// ```
pub trait IdentityProvider: TokenSource {
    /// Starts a change subscription.
    ///
    /// The provider should deliver the current state first (if it knows
    /// it) and then every change. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderChange>;

    /// Reads the decoded claims of `user`. Claims are trusted verbatim.
    fn claims(
        &self,
        user: &PublicUser,
    ) -> impl Future<Output = Result<Claims, SessionError>> + Send;
}

/// A [`TokenSource`] that never has a token.
///
/// Used where no provider exists, i.e. by embedded-mode request builders
/// whose credential comes from the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTokenSource;

impl TokenSource for NoTokenSource {
    async fn fresh_token(&self) -> Result<Option<String>, SessionError> {
        Ok(None)
    }
}
