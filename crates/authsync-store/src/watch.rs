//! Read side of the store.

use std::sync::Arc;

use authsync_session::AuthSession;
use tokio::sync::watch;

use crate::StoreError;

/// A subscription to the canonical session.
///
/// Every value observed is a complete session; there is no way to see a
/// half-applied update. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SessionWatch {
    rx: watch::Receiver<Arc<AuthSession>>,
}

impl SessionWatch {
    pub(crate) fn new(rx: watch::Receiver<Arc<AuthSession>>) -> Self {
        Self { rx }
    }

    /// The current session.
    pub fn snapshot(&self) -> Arc<AuthSession> {
        Arc::clone(&self.rx.borrow())
    }

    /// Waits for the next replacement and returns it.
    ///
    /// # Errors
    /// `StoreError::Closed` once the store is gone.
    pub async fn changed(&mut self) -> Result<Arc<AuthSession>, StoreError> {
        self.rx.changed().await.map_err(|_| StoreError::Closed)?;
        Ok(Arc::clone(&self.rx.borrow_and_update()))
    }

    /// Waits until the session has left `Loading` and returns it. Returns
    /// immediately if it already has.
    ///
    /// # Errors
    /// `StoreError::Closed` if the store shuts down first.
    pub async fn wait_resolved(&mut self) -> Result<Arc<AuthSession>, StoreError> {
        let session = self
            .rx
            .wait_for(|session| session.is_resolved())
            .await
            .map_err(|_| StoreError::Closed)?;
        Ok(Arc::clone(&session))
    }

    /// Resolves once the store has shut down or been dropped.
    pub async fn closed(&self) {
        let mut rx = self.rx.clone();
        while rx.changed().await.is_ok() {}
    }
}
