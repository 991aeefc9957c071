//! Cross-tab broadcast: same-origin tabs mirroring each other's session.
//!
//! Each tab publishes its standalone session after every local change and
//! applies what the others publish as a full replacement. The channel
//! itself promises no ordering across tabs. Within one publisher, every
//! message is stamped with the publisher's [`TabId`] and a counter, and
//! receivers drop a message that is not newer than the last one applied
//! from the same tab.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use authsync_protocol::{AuthState, BroadcastMessage, Codec, JsonCodec, TabId};
use authsync_session::AuthSession;
use authsync_transport::Connection;
use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::ChannelError;

/// Channel name tabs agree on unless configured otherwise.
pub const DEFAULT_CHANNEL_NAME: &str = "auth_channel";

/// One tab's handle on the shared broadcast channel.
///
/// Wraps a [`Connection`] to the channel (a
/// [`BusPort`](authsync_transport::BusPort) in process, or any relay).
/// Use one [`subscribe`](Self::subscribe) per value.
pub struct CrossTabBroadcast<C: Connection, K: Codec = JsonCodec> {
    conn: Arc<C>,
    codec: Arc<K>,
    tab: TabId,
    seq: AtomicU64,
}

impl<C: Connection> CrossTabBroadcast<C> {
    pub fn new(conn: Arc<C>) -> Self {
        Self::with_codec(conn, JsonCodec)
    }
}

impl<C: Connection, K: Codec> CrossTabBroadcast<C, K> {
    /// Joins the channel under a freshly generated tab id.
    pub fn with_codec(conn: Arc<C>, codec: K) -> Self {
        let tab = TabId(rand::rng().random());
        tracing::debug!(%tab, conn_id = %conn.id(), "joined broadcast channel");
        Self {
            conn,
            codec: Arc::new(codec),
            tab,
            seq: AtomicU64::new(0),
        }
    }

    pub fn tab_id(&self) -> TabId {
        self.tab
    }

    /// Publishes `session` to every other tab.
    ///
    /// The identity is reduced to its public fields. Anything not `Ready`
    /// goes out as a sign-out.
    ///
    /// # Errors
    /// `ChannelError::Transport` if the channel rejects the message.
    pub async fn publish(&self, session: &AuthSession) -> Result<(), ChannelError> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let state = AuthState {
            tab: Some(self.tab),
            seq: Some(seq),
            ..session.to_broadcast()
        };
        let signed_in = state.is_signed_in();
        let data = self
            .codec
            .encode(&BroadcastMessage::AuthStateChanged(state))?;
        self.conn
            .send(&data)
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        tracing::debug!(tab = %self.tab, seq, signed_in, "published session");
        Ok(())
    }

    /// Starts applying the other tabs' messages.
    ///
    /// Dropping the returned subscription stops the listener.
    pub fn subscribe(&self) -> BroadcastSubscription {
        let conn = Arc::clone(&self.conn);
        let codec = Arc::clone(&self.codec);
        let own_tab = self.tab;
        let (tx, rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            let mut filter = StaleFilter::new(own_tab);
            loop {
                let data = match conn.recv().await {
                    Ok(Some(data)) => data,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(tab = %own_tab, error = %e, "broadcast channel failed");
                        break;
                    }
                };

                let BroadcastMessage::AuthStateChanged(state) = match codec.decode::<BroadcastMessage>(&data) {
                    Ok(msg) => msg,
                    Err(e) => {
                        tracing::debug!(tab = %own_tab, error = %e, "ignoring undecodable broadcast");
                        continue;
                    }
                };

                if !filter.admit(&state) {
                    continue;
                }
                if tx.send(AuthSession::from_broadcast(&state)).is_err() {
                    break;
                }
            }
            tracing::debug!(tab = %own_tab, "broadcast listener stopped");
        });

        BroadcastSubscription { rx, task }
    }
}

/// Most sibling tabs a listener remembers. Tab ids change on every
/// reload; beyond this the tab heard from least recently is forgotten and
/// its next message is admitted like an unstamped one.
pub(crate) const MAX_TRACKED_TABS: usize = 64;

/// Drops messages a tab has already superseded.
pub(crate) struct StaleFilter {
    own_tab: TabId,
    /// Last admitted seq per tab, with the admission tick it was seen at.
    last_seq: HashMap<TabId, (u64, u64)>,
    tick: u64,
}

impl StaleFilter {
    pub(crate) fn new(own_tab: TabId) -> Self {
        Self {
            own_tab,
            last_seq: HashMap::new(),
            tick: 0,
        }
    }

    /// Returns `true` if `state` should be applied.
    ///
    /// Messages without a tab or seq can't be ordered and are always
    /// applied. Echoes of our own messages (a relay that doesn't filter)
    /// never are.
    pub(crate) fn admit(&mut self, state: &AuthState) -> bool {
        let (Some(tab), Some(seq)) = (state.tab, state.seq) else {
            return true;
        };
        if tab == self.own_tab {
            return false;
        }
        if let Some(&(last, _)) = self.last_seq.get(&tab) {
            if seq <= last {
                tracing::debug!(%tab, seq, last, "dropping stale broadcast");
                return false;
            }
        } else if self.last_seq.len() >= MAX_TRACKED_TABS {
            self.forget_quietest();
        }
        self.tick += 1;
        self.last_seq.insert(tab, (seq, self.tick));
        true
    }

    fn forget_quietest(&mut self) {
        let quietest = self
            .last_seq
            .iter()
            .min_by_key(|(_, (_, seen))| *seen)
            .map(|(tab, _)| *tab);
        if let Some(tab) = quietest {
            self.last_seq.remove(&tab);
            tracing::debug!(%tab, "forgetting quietest tab");
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.last_seq.len()
    }
}

/// A running broadcast listener yielding one session per admitted
/// message. Dropping it stops the listener.
pub struct BroadcastSubscription {
    rx: mpsc::UnboundedReceiver<AuthSession>,
    task: JoinHandle<()>,
}

impl BroadcastSubscription {
    /// Next mirrored session, or `None` once the channel has closed.
    pub async fn recv(&mut self) -> Option<AuthSession> {
        self.rx.recv().await
    }
}

impl Drop for BroadcastSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamped(tab: u64, seq: u64) -> AuthState {
        AuthState {
            tab: Some(TabId(tab)),
            seq: Some(seq),
            ..AuthState::signed_out()
        }
    }

    #[test]
    fn test_admit_increasing_seq_accepted() {
        let mut filter = StaleFilter::new(TabId(1));
        assert!(filter.admit(&stamped(2, 1)));
        assert!(filter.admit(&stamped(2, 2)));
        assert!(filter.admit(&stamped(2, 7)));
    }

    #[test]
    fn test_admit_repeated_or_older_seq_rejected() {
        let mut filter = StaleFilter::new(TabId(1));
        assert!(filter.admit(&stamped(2, 5)));
        assert!(!filter.admit(&stamped(2, 5)));
        assert!(!filter.admit(&stamped(2, 3)));
    }

    #[test]
    fn test_admit_tracks_tabs_independently() {
        let mut filter = StaleFilter::new(TabId(1));
        assert!(filter.admit(&stamped(2, 9)));
        assert!(filter.admit(&stamped(3, 1)));
    }

    #[test]
    fn test_admit_unstamped_always_accepted() {
        let mut filter = StaleFilter::new(TabId(1));
        assert!(filter.admit(&AuthState::signed_out()));
        assert!(filter.admit(&AuthState::signed_out()));
    }

    #[test]
    fn test_admit_own_tab_rejected() {
        let mut filter = StaleFilter::new(TabId(1));
        assert!(!filter.admit(&stamped(1, 1)));
    }

    #[test]
    fn test_admit_tracked_tabs_stay_bounded() {
        let mut filter = StaleFilter::new(TabId(0));
        for tab in 1..=(MAX_TRACKED_TABS as u64 * 3) {
            assert!(filter.admit(&stamped(tab, 1)));
        }
        assert_eq!(filter.tracked(), MAX_TRACKED_TABS);
    }

    #[test]
    fn test_admit_full_filter_forgets_quietest_tab() {
        let mut filter = StaleFilter::new(TabId(0));
        for tab in 1..=MAX_TRACKED_TABS as u64 {
            assert!(filter.admit(&stamped(tab, 5)));
        }
        // Tab 1 speaks again, so tab 2 becomes the quietest.
        assert!(filter.admit(&stamped(1, 6)));

        assert!(filter.admit(&stamped(1000, 1)));

        assert!(filter.admit(&stamped(2, 5)), "forgotten tab starts over");
        assert!(!filter.admit(&stamped(1, 6)), "recent tab still filtered");
    }
}
