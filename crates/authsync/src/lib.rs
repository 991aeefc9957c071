//! # authsync
//!
//! Multi-tenant session management for applications that run either on
//! their own or embedded inside a host frame.
//!
//! A [`SessionStore`] resolves *who is signed in and for which tenant*
//! from exactly one source, picked once at construction:
//!
//! - **Standalone**: an [`IdentityProvider`] pushes sign-in and sign-out
//!   changes; same-origin tabs mirror each other over a
//!   [`CrossTabBroadcast`].
//! - **Embedded**: the host frame answers an `IFRAME_READY` handshake with
//!   a token and tenant name ([`HandshakeChannel`]).
//!
//! An [`ApiClient`] then stamps every outbound call with the tenant
//! header and a credential, and returns a redacted [`DebugRecord`] with
//! every outcome.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use authsync::prelude::*;
//!
//! authsync::telemetry::init();
//! let config = AuthSyncConfig::from_env()?;
//!
//! let provider = Arc::new(MyProvider::connect().await?);
//! let store = SessionStore::builder()
//!     .standalone(SessionSource::new(Arc::clone(&provider)))
//!     .build()?;
//! store.wait_resolved().await?;
//!
//! let api = ApiClient::new(config.api, store.subscribe(), provider)?;
//! let limits = api.fetch("/tracks_limits", RequestOptions::new()).await?;
//! ```

pub mod config;
mod error;
pub mod telemetry;

pub use config::{AuthSyncConfig, ConfigError};
pub use error::AuthSyncError;

pub use authsync_channel as channel;
pub use authsync_protocol as protocol;
pub use authsync_request as request;
pub use authsync_session as session;
pub use authsync_store as store;
pub use authsync_transport as transport;

pub use authsync_channel::{CrossTabBroadcast, HandshakeChannel, HandshakeConfig};
pub use authsync_request::{
    ApiClient, ApiConfig, ApiResponse, CredentialScheme, DebugRecord, RequestDescriptor,
    RequestOptions,
};
pub use authsync_session::{
    AuthSession, IdentityProvider, SessionMode, SessionSource, SessionStatus, TokenSource,
};
pub use authsync_store::{FrameContext, SessionStore, SessionWatch};

/// The types most applications need.
pub mod prelude {
    pub use std::sync::Arc;

    pub use authsync_channel::{CrossTabBroadcast, HandshakeChannel, HandshakeConfig};
    pub use authsync_protocol::{Claims, GroupRef, PublicUser, Tenant};
    pub use authsync_request::{ApiClient, ApiConfig, CredentialScheme, Method, RequestOptions};
    pub use authsync_session::{
        AuthSession, IdentityProvider, SessionMode, SessionSource, SessionStatus, TokenSource,
    };
    pub use authsync_store::{FrameContext, SessionStore, SessionWatch};

    pub use crate::{AuthSyncConfig, AuthSyncError};
}
