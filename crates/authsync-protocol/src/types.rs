//! Identity and claim types shared by every layer.
//!
//! These are the values that travel between a host frame and its guest,
//! and between sibling tabs. Their serde attributes pin the exact JSON
//! shape the browser side produces, so renaming a field here is a wire
//! break.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Tenant and groups
// ---------------------------------------------------------------------------

/// The organizational scope used to partition backend data.
///
/// `name` is what ends up in the `X-DB-Name` request header; `id` is the
/// provider's identifier for the tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub name: String,
}

impl Tenant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A group the principal belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupRef {
    pub id: String,
    pub name: String,
}

impl GroupRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// PublicUser
// ---------------------------------------------------------------------------

/// The public fields an identity is reduced to before it leaves the tab.
///
/// Nothing secret lives here: no tokens, no refresh handles. This is the
/// `user` object of a cross-tab broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    /// The provider's stable user identifier.
    pub uid: String,

    /// Email address, when the provider knows one.
    #[serde(default)]
    pub email: Option<String>,

    /// Whether the provider verified `email`.
    #[serde(default)]
    pub email_verified: bool,
}

impl PublicUser {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            email_verified: false,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>, verified: bool) -> Self {
        self.email = Some(email.into());
        self.email_verified = verified;
        self
    }
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

/// Decoded assertions attached to one identity event.
///
/// Claims are trusted verbatim: the identity provider already checked the
/// signature and expiry before handing them to us. A snapshot is never
/// merged with another one; each sign-in carries its own complete set.
///
/// The provider may send `null` (or omit) `groups` and `permissions`; both
/// decode as empty lists.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub tenant: Option<Tenant>,

    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub groups: Vec<GroupRef>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub permissions: Vec<String>,
}

impl Claims {
    /// Decodes claims from the JSON object a provider returns.
    ///
    /// # Errors
    /// `ProtocolError::Decode` when a known claim has the wrong shape
    /// (e.g. `tenant` is a string instead of an object).
    #[cfg(feature = "json")]
    pub fn from_json(
        value: serde_json::Value,
    ) -> Result<Self, crate::ProtocolError> {
        serde_json::from_value(value).map_err(crate::ProtocolError::Decode)
    }

    /// `true` when the claims name a tenant. Without one the application
    /// has no data scope and must treat the user as signed out.
    pub fn has_tenant(&self) -> bool {
        self.tenant.is_some()
    }
}

/// Deserializes `null` or a missing field as an empty `Vec`.
pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// AuthToken
// ---------------------------------------------------------------------------

/// A credential handed to the guest by its host.
///
/// `Debug` never prints the value, so a token can sit inside any struct
/// that gets logged with `{:?}`. Call [`expose`](Self::expose) at the one
/// place the raw value is needed (building the request header).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

// ---------------------------------------------------------------------------
// TabId
// ---------------------------------------------------------------------------

/// Identifies one publisher on the cross-tab broadcast channel.
///
/// Serialized as a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab-{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // Claims
    // =====================================================================

    #[test]
    fn test_claims_full_shape_decodes() {
        let json = serde_json::json!({
            "tenant": { "id": "t1", "name": "acme" },
            "user_id": "u1",
            "groups": [{ "id": "g1", "name": "Admins" }],
            "permissions": ["read", "write"],
            "iss": "ignored-extra-claim"
        });

        let claims = Claims::from_json(json).unwrap();

        assert_eq!(claims.tenant, Some(Tenant::new("t1", "acme")));
        assert_eq!(claims.user_id.as_deref(), Some("u1"));
        assert_eq!(claims.groups, vec![GroupRef::new("g1", "Admins")]);
        assert_eq!(claims.permissions, vec!["read", "write"]);
    }

    #[test]
    fn test_claims_null_lists_decode_as_empty() {
        let json = serde_json::json!({
            "tenant": null,
            "groups": null,
            "permissions": null
        });

        let claims = Claims::from_json(json).unwrap();

        assert!(!claims.has_tenant());
        assert!(claims.groups.is_empty());
        assert!(claims.permissions.is_empty());
    }

    #[test]
    fn test_claims_missing_everything_is_default() {
        let claims = Claims::from_json(serde_json::json!({})).unwrap();
        assert_eq!(claims, Claims::default());
    }

    #[test]
    fn test_claims_wrong_tenant_shape_is_decode_error() {
        let json = serde_json::json!({ "tenant": "acme" });
        assert!(matches!(
            Claims::from_json(json),
            Err(crate::ProtocolError::Decode(_))
        ));
    }

    // =====================================================================
    // PublicUser
    // =====================================================================

    #[test]
    fn test_public_user_uses_camel_case() {
        let user = PublicUser::new("uid-1").with_email("a@b.c", true);
        let json = serde_json::to_value(&user).unwrap();

        assert_eq!(json["uid"], "uid-1");
        assert_eq!(json["email"], "a@b.c");
        assert_eq!(json["emailVerified"], true);
    }

    // =====================================================================
    // AuthToken
    // =====================================================================

    #[test]
    fn test_auth_token_debug_is_redacted() {
        let token = AuthToken::new("super-secret");
        let debug = format!("{token:?}");
        assert!(!debug.contains("super-secret"));
        assert_eq!(token.expose(), "super-secret");
    }

    #[test]
    fn test_auth_token_serializes_as_plain_string() {
        let json = serde_json::to_string(&AuthToken::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }

    #[test]
    fn test_auth_token_blank_is_empty() {
        assert!(AuthToken::new("   ").is_empty());
        assert!(!AuthToken::new("x").is_empty());
    }

    #[test]
    fn test_tab_id_display() {
        assert_eq!(TabId(255).to_string(), "tab-00000000000000ff");
    }
}
