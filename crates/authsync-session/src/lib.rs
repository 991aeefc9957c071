//! Session model and identity-provider adapter for authsync.
//!
//! This crate owns the two things every other layer agrees on:
//!
//! 1. **The session value** ([`AuthSession`]), an immutable snapshot of
//!    who is signed in, built whole by one constructor per event
//! 2. **The provider seam** ([`IdentityProvider`], [`TokenSource`]) and the
//!    adapter that turns provider notifications into [`SourceEvent`]s
//!    ([`SessionSource`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Store (above)  ← swaps AuthSession values in and out
//!     ↕
//! Session layer (this crate)  ← session model, provider adapter
//!     ↕
//! Protocol (below)  ← Claims, PublicUser, AuthState
//! ```

mod error;
#[cfg(any(test, feature = "test-util"))]
mod mock;
mod model;
mod provider;
mod source;

pub use error::SessionError;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockIdentityProvider;
pub use model::{
    AuthSession, EMBEDDED_TENANT_ID, EMBEDDED_USER_ID, Identity, SessionMode, SessionStatus,
};
pub use provider::{IdentityProvider, NoTokenSource, ProviderChange, TokenSource};
pub use source::{SessionSource, SourceEvent, SourceSubscription};
