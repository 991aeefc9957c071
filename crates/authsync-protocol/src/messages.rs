//! Messages exchanged on the two channels.
//!
//! - [`HandshakeMessage`] travels between a guest frame and its host.
//! - [`BroadcastMessage`] travels between same-origin tabs.
//!
//! Both are internally tagged on `type`, matching what a browser posts:
//!
//! ```text
//! guest → host   { "type": "IFRAME_READY" }
//! host  → guest  { "type": "AUTH_DATA", "authToken": "…", "tenantName": "acme" }
//! tab   → tabs   { "type": "AUTH_STATE_CHANGED", "user": {…}, "tenant": {…}, … }
//! ```

use serde::{Deserialize, Serialize};

use crate::types::null_as_empty;
use crate::{AuthToken, GroupRef, ProtocolError, PublicUser, TabId, Tenant};

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// The guest⇄host handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HandshakeMessage {
    /// Guest → host: "I'm loaded, send me credentials." Sent exactly once
    /// per activation.
    #[serde(rename = "IFRAME_READY")]
    IframeReady,

    /// Host → guest: the credential material. May be sent again later to
    /// rotate the token or switch tenant; each one fully replaces the last.
    #[serde(rename = "AUTH_DATA", rename_all = "camelCase")]
    AuthData {
        auth_token: AuthToken,
        tenant_name: String,
    },
}

impl HandshakeMessage {
    /// Checks protocol rules serde cannot express.
    ///
    /// # Errors
    /// `ProtocolError::InvalidMessage` for an `AUTH_DATA` whose token or
    /// tenant name is blank.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Self::IframeReady => Ok(()),
            Self::AuthData {
                auth_token,
                tenant_name,
            } => {
                if auth_token.is_empty() {
                    return Err(ProtocolError::InvalidMessage(
                        "AUTH_DATA without authToken".into(),
                    ));
                }
                if tenant_name.trim().is_empty() {
                    return Err(ProtocolError::InvalidMessage(
                        "AUTH_DATA without tenantName".into(),
                    ));
                }
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Broadcast
// ---------------------------------------------------------------------------

/// Cross-tab message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BroadcastMessage {
    /// A tab's session changed. Receivers replace their whole session with
    /// the state carried here.
    #[serde(rename = "AUTH_STATE_CHANGED")]
    AuthStateChanged(AuthState),
}

/// Payload of [`BroadcastMessage::AuthStateChanged`].
///
/// A signed-out state has `user: null`, `tenant: null`, `userId: null` and
/// empty lists.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    #[serde(default)]
    pub user: Option<PublicUser>,

    #[serde(default)]
    pub tenant: Option<Tenant>,

    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub groups: Vec<GroupRef>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub permissions: Vec<String>,

    /// Publishing tab. Absent for publishers that don't stamp one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab: Option<TabId>,

    /// Per-tab monotonic counter. Receivers drop a message whose `seq` is
    /// not newer than the last one applied from the same `tab`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl AuthState {
    /// The payload a tab publishes when it signs out.
    pub fn signed_out() -> Self {
        Self::default()
    }

    /// `true` when the state describes a usable session: a user *and* a
    /// tenant scope.
    pub fn is_signed_in(&self) -> bool {
        self.user.is_some() && self.tenant.is_some()
    }
}
