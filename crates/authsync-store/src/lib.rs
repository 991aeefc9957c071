//! The canonical session store for authsync.
//!
//! A [`SessionStore`] is an actor task that owns the one [`AuthSession`]
//! an application trusts. Its mode is decided once, at construction:
//!
//! - **Standalone**: listens to the tab's identity provider and mirrors
//!   sibling tabs through the cross-tab broadcast
//! - **Embedded**: listens only to the host handshake
//!
//! The two never cross-talk. Readers take a [`SessionWatch`] and must not
//! mount dependent UI until [`SessionWatch::wait_resolved`] returns.
//!
//! # Key types
//!
//! - [`SessionStoreBuilder`]: wiring and mode selection
//! - [`SessionStore`]: handle to the running actor
//! - [`SessionWatch`]: read side, cheap to clone
//! - [`FrameContext`] / [`resolve_mode`]: how the mode is picked
//!
//! [`AuthSession`]: authsync_session::AuthSession

mod error;
mod mode;
mod store;
mod watch;

pub use error::StoreError;
pub use mode::{FrameContext, resolve_mode};
pub use store::{SessionStore, SessionStoreBuilder};
pub use watch::SessionWatch;
