//! Codec trait and implementations for the handshake and broadcast wire.
//!
//! The host frame and sibling tabs exchange plain JSON objects, so
//! [`JsonCodec`] is the codec every channel uses by default. Channels are
//! generic over [`Codec`] so a deployment that relays messages through a
//! different framing only has to swap this one piece.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Converts wire messages to and from bytes.
///
/// `Send + Sync + 'static` because a codec lives inside the long-running
/// listener tasks spawned by the handshake and broadcast channels.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a message into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes into a message.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or carry
    /// an unknown `type` tag.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that speaks JSON, the format browser frames post to each
/// other.
///
/// ```rust
/// use authsync_protocol::{Codec, HandshakeMessage, JsonCodec};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&HandshakeMessage::IframeReady).unwrap();
/// assert_eq!(bytes, br#"{"type":"IFRAME_READY"}"#);
///
/// let back: HandshakeMessage = codec.decode(&bytes).unwrap();
/// assert_eq!(back, HandshakeMessage::IframeReady);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
