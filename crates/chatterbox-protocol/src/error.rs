//! Error types for the protocol layer.
//!
//! Each crate in Chatterbox defines its own error enum. When you see a
//! `ProtocolError`, the problem is in the shape of a message, not in the
//! network or in session bookkeeping.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, a `type` tag the relay doesn't
    /// know, or a whisper without its `to` field.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message is invalid at the protocol level.
    ///
    /// For frames that pass the transport but violate protocol rules,
    /// e.g. a handshake that isn't valid UTF-8.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
