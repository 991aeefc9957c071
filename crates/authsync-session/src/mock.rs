//! An in-memory [`IdentityProvider`] for tests.
//!
//! Scripted from the test body: `sign_in`, `sign_out`, and `fail` push a
//! change to every live subscriber, and the last change is replayed to new
//! subscribers the way a real provider reports its current state.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use authsync_protocol::{Claims, PublicUser};
use tokio::sync::mpsc;

use crate::{IdentityProvider, ProviderChange, SessionError, TokenSource};

#[derive(Default)]
struct MockState {
    /// Replayed on subscribe. `None` until the first scripted change.
    current: Option<ProviderChange>,
    subscribers: Vec<mpsc::UnboundedSender<ProviderChange>>,
    claims: HashMap<String, Claims>,
    claims_error: Option<SessionError>,
    token: Option<Result<Option<String>, SessionError>>,
    token_requests: usize,
}

/// Scriptable identity provider.
#[derive(Default)]
pub struct MockIdentityProvider {
    state: Mutex<MockState>,
}

impl MockIdentityProvider {
    /// A provider that hasn't reported anything yet. Subscribers see no
    /// event until the test scripts one.
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose current state is `user` signed in with `claims`.
    pub fn signed_in(user: PublicUser, claims: Claims) -> Self {
        let provider = Self::new();
        provider.sign_in(user, claims);
        provider
    }

    /// A provider whose current state is "nobody signed in".
    pub fn signed_out() -> Self {
        let provider = Self::new();
        provider.sign_out();
        provider
    }

    pub fn sign_in(&self, user: PublicUser, claims: Claims) {
        let mut state = self.lock();
        state.claims.insert(user.uid.clone(), claims);
        Self::publish(&mut state, Ok(Some(user)));
    }

    pub fn sign_out(&self) {
        Self::publish(&mut self.lock(), Ok(None));
    }

    /// Reports a provider failure on the change stream.
    pub fn fail(&self, err: SessionError) {
        Self::publish(&mut self.lock(), Err(err));
    }

    /// Makes every later `claims` call fail with `err`.
    pub fn fail_claims(&self, err: SessionError) {
        self.lock().claims_error = Some(err);
    }

    /// Token returned by later `fresh_token` calls.
    pub fn set_token(&self, token: impl Into<String>) {
        self.lock().token = Some(Ok(Some(token.into())));
    }

    /// Makes every later `fresh_token` call fail with `err`.
    pub fn fail_token(&self, err: SessionError) {
        self.lock().token = Some(Err(err));
    }

    /// How many times `fresh_token` was called.
    pub fn token_requests(&self) -> usize {
        self.lock().token_requests
    }

    /// Subscribers whose receiver is still alive.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.lock();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }

    fn publish(state: &mut MockState, change: ProviderChange) {
        state
            .subscribers
            .retain(|tx| tx.send(change.clone()).is_ok());
        state.current = Some(change);
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenSource for MockIdentityProvider {
    async fn fresh_token(&self) -> Result<Option<String>, SessionError> {
        let mut state = self.lock();
        state.token_requests += 1;
        match &state.token {
            Some(token) => token.clone(),
            None => Ok(None),
        }
    }
}

impl IdentityProvider for MockIdentityProvider {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        if let Some(current) = &state.current {
            let _ = tx.send(current.clone());
        }
        state.subscribers.push(tx);
        rx
    }

    async fn claims(&self, user: &PublicUser) -> Result<Claims, SessionError> {
        let state = self.lock();
        if let Some(err) = &state.claims_error {
            return Err(err.clone());
        }
        state
            .claims
            .get(&user.uid)
            .cloned()
            .ok_or_else(|| SessionError::Provider(format!("unknown user {}", user.uid)))
    }
}
