//! Per-connection session loop: handshake, join, message routing, leave.
//!
//! Each accepted connection gets its own Tokio task running a
//! [`SessionLoop`]. The flow is:
//!   1. Receive one text frame → the display name
//!   2. Register the session → everyone sees the join notice
//!   3. Loop: receive frames → decode → [`Dispatcher::route`]
//!   4. Unregister → everyone left sees the leave notice

use std::sync::Arc;
use std::time::Duration;

use chatterbox_protocol::{ClientMessage, Codec, ProtocolError, ProtocolLine, Verb};
use chatterbox_session::{spawn_writer, validate_display_name, Session, SessionError};
use chatterbox_transport::{Connection, TransportError};

use crate::config::RelayConfig;
use crate::dispatcher::{Dispatcher, Flow, Notice};
use crate::{lines, ChatterboxError};

/// Subject used in protocol logs before the client has a name.
const UNKNOWN_USER: &str = "unknown user";

/// Where a session is in its lifecycle. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Handshaking,
    Active,
    Closing,
    Closed,
}

/// Drives one connection from accept to close.
pub struct SessionLoop<C, K> {
    conn: Arc<C>,
    dispatcher: Dispatcher,
    codec: K,
    handshake_timeout: Duration,
    outbox_capacity: usize,
    phase: Phase,
}

impl<C, K> SessionLoop<C, K>
where
    C: Connection<Error = TransportError>,
    K: Codec,
{
    pub fn new(conn: C, dispatcher: Dispatcher, codec: K, config: &RelayConfig) -> Self {
        Self {
            conn: Arc::new(conn),
            dispatcher,
            codec,
            handshake_timeout: config.handshake_timeout,
            outbox_capacity: config.outbox_capacity,
            phase: Phase::Handshaking,
        }
    }

    /// Runs the session to completion.
    ///
    /// # Errors
    /// Returns an error if the handshake fails (the connection never
    /// joined) or if the connection broke mid-session. A clean
    /// `DISCONNECT` or close from the client is `Ok`.
    pub async fn run(mut self) -> Result<(), ChatterboxError> {
        let conn_id = self.conn.id();
        tracing::debug!(%conn_id, "handling new connection");

        // --- Step 1: Handshake ---
        let name = match self.handshake().await {
            Ok(name) => name,
            Err(e) => {
                self.enter(Phase::Closed);
                return Err(e);
            }
        };

        // --- Step 2: Join ---
        let registry = Arc::clone(self.dispatcher.registry());
        let (session, outbox) =
            Session::with_capacity(registry.next_id(), name, self.outbox_capacity);
        let _writer = spawn_writer(&session, Arc::clone(&self.conn), outbox);
        registry.add(Arc::clone(&session)).await;

        tracing::info!(
            "{}",
            ProtocolLine::inbound(UNKNOWN_USER, Verb::Connect).arg(session.name())
        );
        self.dispatcher
            .broadcast(&Notice::Joined(session.name().to_string()))
            .await;
        tracing::info!(
            session_id = %session.id(),
            %conn_id,
            "{}",
            ProtocolLine::outbound(session.name(), Verb::Connected)
        );
        self.enter(Phase::Active);

        // --- Step 3: Message loop ---
        let result = self.pump(&session).await;

        // --- Step 4: Leave ---
        self.enter(Phase::Closing);
        registry.remove_by_id(session.id()).await;
        tracing::info!(
            session_id = %session.id(),
            "{}",
            ProtocolLine::outbound(session.name(), Verb::Disconnected)
        );
        self.dispatcher
            .broadcast(&Notice::Left(session.name().to_string()))
            .await;
        session.close();
        self.enter(Phase::Closed);

        result
    }

    /// Reads the display name. On a bad name the client is told why and
    /// the connection is closed; it is never registered.
    async fn handshake(&self) -> Result<String, ChatterboxError> {
        let data = match tokio::time::timeout(self.handshake_timeout, self.conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => return Err(SessionError::ClosedBeforeHandshake.into()),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                let _ = self.conn.close().await;
                return Err(SessionError::HandshakeTimedOut.into());
            }
        };

        let raw = String::from_utf8(data).map_err(|_| {
            ProtocolError::InvalidMessage("display name is not valid UTF-8".into())
        })?;

        match validate_display_name(&raw) {
            Ok(name) => Ok(name),
            Err(SessionError::InvalidDisplayName(reason)) => {
                tracing::debug!(conn_id = %self.conn.id(), %reason, "rejected display name");
                let _ = self.conn.send_text(&lines::invalid_name(&reason)).await;
                let _ = self.conn.close().await;
                Err(SessionError::InvalidDisplayName(reason).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Reads and routes messages until the client leaves, the connection
    /// breaks, or the relay gives up on the session (stalled writer,
    /// shutdown).
    async fn pump(&self, session: &Arc<Session>) -> Result<(), ChatterboxError> {
        loop {
            let received = tokio::select! {
                received = self.conn.recv() => received,
                () = session.disconnected() => {
                    tracing::debug!(session_id = %session.id(), "session dropped by the relay");
                    return Ok(());
                }
            };
            let data = match received {
                Ok(Some(data)) => data,
                Ok(None) => {
                    tracing::debug!(session_id = %session.id(), "connection closed by peer");
                    return Ok(());
                }
                Err(e) => {
                    tracing::info!(
                        session_id = %session.id(),
                        "{}",
                        ProtocolLine::outbound(session.name(), Verb::FatalError).arg(&e)
                    );
                    return Err(e.into());
                }
            };

            let msg = match self.codec.decode::<ClientMessage>(&data) {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::debug!(session_id = %session.id(), error = %e, "undecodable frame");
                    ClientMessage::Error {
                        input: String::from_utf8_lossy(&data).into_owned(),
                    }
                }
            };

            if self.dispatcher.route(session, msg).await == Flow::Disconnect {
                return Ok(());
            }
        }
    }

    fn enter(&mut self, next: Phase) {
        debug_assert!(next >= self.phase, "phase went backwards: {:?} -> {next:?}", self.phase);
        tracing::trace!(conn_id = %self.conn.id(), from = ?self.phase, to = ?next, "phase change");
        self.phase = next;
    }
}
