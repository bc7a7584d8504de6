//! Unified error type for the relay.

use chatterbox_protocol::ProtocolError;
use chatterbox_session::SessionError;
use chatterbox_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
///
/// Only a `Transport` error returned from [`RelayServer::build`]
/// (failing to bind) is fatal to the process; every other error ends a
/// single session at most.
///
/// [`RelayServer::build`]: crate::RelayServerBuilder::build
#[derive(Debug, thiserror::Error)]
pub enum ChatterboxError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (bad name, handshake timeout).
    #[error(transparent)]
    Session(#[from] SessionError),
}
