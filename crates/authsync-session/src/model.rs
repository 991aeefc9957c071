//! The canonical session value.
//!
//! An [`AuthSession`] is never edited in place. Every event (sign-in,
//! sign-out, handshake completion, broadcast message) builds a brand new
//! value through one of the constructors below, and the store swaps it in
//! whole. That is what rules out a session holding the groups of one user
//! and the tenant of another.
//!
//! The constructors are also where the invariants live:
//!
//! - `Ready` in standalone mode ⇒ an identity *and* a tenant.
//! - `Ready` in embedded mode ⇒ a host token *and* a tenant name.
//! - An identity without a tenant is never `Ready`; it collapses to a
//!   signed-out `Unauthenticated` session.

use std::fmt;
use std::sync::Arc;

use authsync_protocol::{
    AuthState, AuthToken, Claims, GroupRef, PublicUser, Tenant,
};

/// Tenant id given to sessions whose tenant came from a host frame.
pub const EMBEDDED_TENANT_ID: &str = "embedded";

/// User id given to sessions whose credentials came from a host frame.
pub const EMBEDDED_USER_ID: &str = "embedded-user";

// ---------------------------------------------------------------------------
// Mode and status
// ---------------------------------------------------------------------------

/// Where the session's credentials come from. Fixed for the lifetime of a
/// store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionMode {
    /// A top-level tab talking to the identity provider directly.
    Standalone,
    /// A guest frame that receives credentials from its host.
    Embedded,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standalone => f.write_str("standalone"),
            Self::Embedded => f.write_str("embedded"),
        }
    }
}

/// Resolution state of a session.
///
/// ```text
/// Loading ──(first event)──→ Ready ⇄ Unauthenticated
/// ```
///
/// Nothing ever goes back to `Loading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Loading,
    Ready,
    Unauthenticated,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => f.write_str("loading"),
            Self::Ready => f.write_str("ready"),
            Self::Unauthenticated => f.write_str("unauthenticated"),
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Who the session belongs to, and where that knowledge came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Signed in through this tab's own identity provider. Carries the
    /// claims snapshot of the sign-in event.
    Provider {
        user: PublicUser,
        claims: Arc<Claims>,
    },

    /// Signed in according to another tab's broadcast. Only public fields
    /// are known.
    Mirrored { user: PublicUser },

    /// Credentials handed over verbatim by the host frame.
    Host { token: AuthToken },
}

impl Identity {
    /// The public user, when the identity has one (host identities don't).
    pub fn user(&self) -> Option<&PublicUser> {
        match self {
            Self::Provider { user, .. } | Self::Mirrored { user } => Some(user),
            Self::Host { .. } => None,
        }
    }

    /// The claims snapshot behind a provider sign-in.
    pub fn claims(&self) -> Option<&Claims> {
        match self {
            Self::Provider { claims, .. } => Some(claims),
            _ => None,
        }
    }

    /// The host-supplied token of an embedded identity.
    pub fn host_token(&self) -> Option<&AuthToken> {
        match self {
            Self::Host { token } => Some(token),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// AuthSession
// ---------------------------------------------------------------------------

/// The single source of truth about who is signed in, for which tenant,
/// with which groups and permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    identity: Option<Identity>,
    tenant: Option<Tenant>,
    user_id: Option<String>,
    groups: Vec<GroupRef>,
    permissions: Vec<String>,
    mode: SessionMode,
    status: SessionStatus,
    last_error: Option<String>,
}

impl AuthSession {
    /// The session a store starts with, before any source has spoken.
    pub fn loading(mode: SessionMode) -> Self {
        Self::empty(mode, SessionStatus::Loading)
    }

    /// Nobody is signed in.
    pub fn signed_out(mode: SessionMode) -> Self {
        Self::empty(mode, SessionStatus::Unauthenticated)
    }

    /// The identity source failed. The session is signed out and keeps
    /// the error message for diagnostics.
    pub fn failed(mode: SessionMode, error: impl fmt::Display) -> Self {
        Self {
            last_error: Some(error.to_string()),
            ..Self::signed_out(mode)
        }
    }

    /// A standalone sign-in. Claims without a tenant produce a signed-out
    /// session: the application has nothing to scope data to.
    pub fn signed_in(user: PublicUser, claims: Arc<Claims>) -> Self {
        let Some(tenant) = claims.tenant.clone() else {
            return Self::signed_out(SessionMode::Standalone);
        };
        Self {
            tenant: Some(tenant),
            user_id: claims.user_id.clone(),
            groups: claims.groups.clone(),
            permissions: claims.permissions.clone(),
            identity: Some(Identity::Provider { user, claims }),
            mode: SessionMode::Standalone,
            status: SessionStatus::Ready,
            last_error: None,
        }
    }

    /// Credentials received from a host frame.
    pub fn embedded(token: AuthToken, tenant_name: impl Into<String>) -> Self {
        Self {
            identity: Some(Identity::Host { token }),
            tenant: Some(Tenant::new(EMBEDDED_TENANT_ID, tenant_name)),
            user_id: Some(EMBEDDED_USER_ID.to_string()),
            groups: Vec::new(),
            permissions: Vec::new(),
            mode: SessionMode::Embedded,
            status: SessionStatus::Ready,
            last_error: None,
        }
    }

    /// The state another tab broadcast. A message without both a user and
    /// a tenant is a sign-out.
    pub fn from_broadcast(state: &AuthState) -> Self {
        match (&state.user, &state.tenant) {
            (Some(user), Some(tenant)) => Self {
                identity: Some(Identity::Mirrored { user: user.clone() }),
                tenant: Some(tenant.clone()),
                user_id: state.user_id.clone(),
                groups: state.groups.clone(),
                permissions: state.permissions.clone(),
                mode: SessionMode::Standalone,
                status: SessionStatus::Ready,
                last_error: None,
            },
            _ => Self::signed_out(SessionMode::Standalone),
        }
    }

    /// Reduces the session to what may leave the tab.
    ///
    /// `tab` and `seq` are left unset; the broadcaster stamps them.
    pub fn to_broadcast(&self) -> AuthState {
        if self.status != SessionStatus::Ready {
            return AuthState::signed_out();
        }
        AuthState {
            user: self.identity.as_ref().and_then(Identity::user).cloned(),
            tenant: self.tenant.clone(),
            user_id: self.user_id.clone(),
            groups: self.groups.clone(),
            permissions: self.permissions.clone(),
            tab: None,
            seq: None,
        }
    }

    fn empty(mode: SessionMode, status: SessionStatus) -> Self {
        Self {
            identity: None,
            tenant: None,
            user_id: None,
            groups: Vec::new(),
            permissions: Vec::new(),
            mode,
            status,
            last_error: None,
        }
    }

    // -- accessors --------------------------------------------------------

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn tenant(&self) -> Option<&Tenant> {
        self.tenant.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn groups(&self) -> &[GroupRef] {
        &self.groups
    }

    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Message of the most recent source error, if this session was
    /// produced by one.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Token received from the host frame (embedded sessions only).
    pub fn host_token(&self) -> Option<&AuthToken> {
        self.identity.as_ref().and_then(Identity::host_token)
    }

    pub fn is_ready(&self) -> bool {
        self.status == SessionStatus::Ready
    }

    /// `false` while loading. Dependent UI must not mount before this
    /// turns `true`.
    pub fn is_resolved(&self) -> bool {
        self.status != SessionStatus::Loading
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}
