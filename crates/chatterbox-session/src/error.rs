//! Error types for the session layer.

/// Errors that can occur while establishing a session.
///
/// Once a session is registered nothing in this crate fails loudly:
/// writes report a plain `bool` and removal is idempotent.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The display name offered in the handshake was rejected.
    #[error("invalid display name: {0}")]
    InvalidDisplayName(String),

    /// The peer closed the connection before sending a display name.
    #[error("connection closed before handshake")]
    ClosedBeforeHandshake,

    /// The peer did not send a display name in time.
    #[error("handshake timed out")]
    HandshakeTimedOut,
}
