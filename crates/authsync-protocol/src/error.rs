//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the bytes on the wire were the problem
//! (they would not encode, would not decode, or decoded into something the
//! protocol forbids), never the connection they travelled over.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, or an
    /// unknown `type` tag.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but violates protocol rules, e.g. an
    /// `AUTH_DATA` with an empty token.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
