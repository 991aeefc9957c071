//! Wire protocol for authsync.
//!
//! This crate defines what the guest, its host, and sibling tabs say to
//! each other:
//!
//! - **Types** ([`Tenant`], [`Claims`], [`PublicUser`], [`AuthToken`], …):
//!   the identity values carried by messages.
//! - **Messages** ([`HandshakeMessage`], [`BroadcastMessage`]): the two
//!   channels' vocabularies.
//! - **Codec** ([`Codec`], [`JsonCodec`]): how messages become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (messages) → Channels → Session store
//! ```

mod codec;
mod error;
mod messages;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use messages::{AuthState, BroadcastMessage, HandshakeMessage};
pub use types::{AuthToken, Claims, GroupRef, PublicUser, TabId, Tenant};
