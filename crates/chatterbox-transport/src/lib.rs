//! Transport abstraction layer for Chatterbox.
//!
//! Provides the [`Transport`], [`Upgrade`] and [`Connection`] traits that
//! abstract over the network protocol carrying chat traffic. The relay
//! core only ever sees these traits: a source of new connections, a
//! handshake step it runs per connection, and a duplex channel whose
//! operations fail cleanly when the peer goes away.
//!
//! Accepting is split in two so the accept loop never waits on a peer.
//! [`Transport::accept`] returns as soon as the socket is accepted;
//! [`Upgrade::upgrade`] does the slow part in the connection's own task.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{PendingWebSocket, WebSocketConnection, WebSocketTransport};

use std::fmt;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// An accepted connection that still has to finish its handshake.
    type Pending: Upgrade;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    ///
    /// Must not wait on the peer beyond the bare accept: protocol
    /// handshakes belong in [`Upgrade::upgrade`], which the caller runs
    /// off the accept loop.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;

    /// Gracefully shuts down the transport, stopping new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// The second half of accepting a connection: the transport-level
/// handshake, run in the connection's own task.
pub trait Upgrade: Send + 'static {
    /// The connection produced once the handshake completes.
    type Connection: Connection;
    /// The error type for a failed handshake.
    type Error: std::error::Error + Send + Sync;

    /// Identifier the finished connection will carry.
    fn id(&self) -> ConnectionId;

    /// Completes the handshake. Callers should bound this with a timeout.
    fn upgrade(self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// A single connection that can send and receive discrete records.
///
/// One call to `send`/`send_text` is one logical unit on the wire, and
/// one `recv` returns exactly one such unit.
///
/// The futures are `Send` so generic code can hand a connection to
/// `tokio::spawn` (the session writer task does exactly that).
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends binary data to the remote peer.
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Sends one line of text to the remote peer.
    ///
    /// Defaults to sending the UTF-8 bytes. Transports with a native text
    /// frame (WebSocket) should override this.
    fn send_text(&self, text: &str) -> impl Future<Output = Result<(), Self::Error>> + Send {
        self.send(text.as_bytes())
    }

    /// Receives the next record from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(&self) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_equality() {
        let a = ConnectionId::new(1);
        let b = ConnectionId::new(1);
        let c = ConnectionId::new(2);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_transport_error_display_names_the_cause() {
        let err = TransportError::ConnectionClosed("peer reset".into());
        assert_eq!(err.to_string(), "connection closed: peer reset");

        let err = TransportError::Shutdown;
        assert_eq!(err.to_string(), "transport shut down");
    }
}
