//! A single connected client, as the relay sees it.
//!
//! A session splits its channel in two:
//! - the **read** side stays with the session loop that owns the
//!   connection (nothing else ever reads from it);
//! - the **write** side is a bounded outbox drained by a dedicated
//!   writer task. Anyone holding an `Arc<Session>` can queue lines on it
//!   without waiting for the peer.
//!
//! ```text
//!  Dispatcher ──send()──→ [outbox] ──writer task──→ Connection::send_text
//!  SessionLoop ─close()─→ [outbox] ──writer task──→ Connection::close
//! ```
//!
//! A peer that stops reading fills its outbox. The next `send` then
//! fails instead of waiting: the session is marked disconnected, its
//! writer gives up on the stuck write, and the connection is dropped.
//! Broadcasting tasks never wait on a slow peer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chatterbox_protocol::SessionId;
use chatterbox_transport::Connection;
use chrono::{DateTime, Local};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Lines a session may have queued before its peer counts as stalled.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 1024;

/// One item in a session's outbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A pre-formatted text line for the client.
    Line(String),
    /// Close the channel after everything queued before it is written.
    Close,
}

/// The receiving end of a session's outbox, handed to [`spawn_writer`].
pub type OutboundRx = mpsc::Receiver<Outbound>;

/// A connected client: its id, display name, and a way to write to it.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    name: String,
    joined_at: DateTime<Local>,
    connected: AtomicBool,
    closed: AtomicBool,
    outbox: mpsc::Sender<Outbound>,
    /// Fires when `connected` goes false.
    gone: Notify,
    /// Tells the writer to abandon a write the peer is not reading.
    stalled: Arc<Notify>,
}

impl Session {
    /// Creates a session with a [`DEFAULT_OUTBOX_CAPACITY`] outbox.
    pub fn new(id: SessionId, name: impl Into<String>) -> (Arc<Self>, OutboundRx) {
        Self::with_capacity(id, name, DEFAULT_OUTBOX_CAPACITY)
    }

    /// Creates a session and the outbox receiver its writer will drain.
    ///
    /// The session starts out connected. Pair the receiver with a
    /// connection via [`spawn_writer`]; until then lines just queue up,
    /// at most `capacity` of them.
    pub fn with_capacity(
        id: SessionId,
        name: impl Into<String>,
        capacity: usize,
    ) -> (Arc<Self>, OutboundRx) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let session = Arc::new(Self {
            id,
            name: name.into(),
            joined_at: Local::now(),
            connected: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            outbox: tx,
            gone: Notify::new(),
            stalled: Arc::new(Notify::new()),
        });
        (session, rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The display name chosen at handshake.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// When the handshake completed, in local time.
    pub fn joined_at(&self) -> DateTime<Local> {
        self.joined_at
    }

    /// `false` once a write has failed, the outbox overflowed, or the
    /// session was closed.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Resolves once the session is no longer connected.
    pub async fn disconnected(&self) {
        loop {
            let notified = self.gone.notified();
            if !self.is_connected() {
                return;
            }
            notified.await;
        }
    }

    /// Queues one line for the client. Never waits.
    ///
    /// Returns `false` if the session is no longer writable, including
    /// when the outbox is full because the peer stopped reading. The
    /// caller must treat that as "peer gone"; nothing is retried and
    /// nothing is logged here.
    pub fn send(&self, line: impl Into<String>) -> bool {
        if !self.is_connected() {
            return false;
        }
        match self.outbox.try_send(Outbound::Line(line.into())) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.mark_disconnected();
                self.stalled.notify_one();
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.mark_disconnected();
                false
            }
        }
    }

    /// Releases the channel. Safe to call any number of times.
    ///
    /// Lines queued before the first `close` are still flushed, unless
    /// the outbox is already full; then the writer is told to give up.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.mark_disconnected();
        match self.outbox.try_send(Outbound::Close) {
            Err(TrySendError::Full(_)) => self.stalled.notify_one(),
            // A gone writer is the outcome we wanted.
            Ok(()) | Err(TrySendError::Closed(_)) => {}
        }
    }

    fn mark_disconnected(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            self.gone.notify_waiters();
        }
    }
}

/// Spawns the task that drains `outbox` into `conn`.
///
/// The task ends when a write fails, when [`Outbound::Close`] arrives,
/// when the session is dropped, or when the session reports its peer as
/// stalled. On the way out it marks the session disconnected (so later
/// `send`s return `false`). Except after a stall, it also closes the
/// connection, which wakes up a reader still parked on `recv`.
pub fn spawn_writer<C: Connection>(
    session: &Arc<Session>,
    conn: Arc<C>,
    mut outbox: OutboundRx,
) -> JoinHandle<()> {
    // Weak, so the writer alone never keeps a dead session alive.
    let weak: Weak<Session> = Arc::downgrade(session);
    let stalled = Arc::clone(&session.stalled);
    tokio::spawn(async move {
        let conn_id = conn.id();
        let drained = tokio::select! {
            () = drain(conn.as_ref(), &mut outbox) => true,
            () = stalled.notified() => false,
        };

        if let Some(session) = weak.upgrade() {
            session.mark_disconnected();
        }
        if drained {
            // Closing twice, or closing a dead socket, is expected here.
            if let Err(e) = conn.close().await {
                tracing::trace!(%conn_id, error = %e, "close after writer exit");
            }
        } else {
            // A close frame would queue behind the stuck write; dropping
            // the connection is all that is left.
            tracing::debug!(%conn_id, "peer stopped reading, abandoning writes");
        }
        tracing::debug!(%conn_id, "writer finished");
    })
}

async fn drain<C: Connection>(conn: &C, outbox: &mut OutboundRx) {
    while let Some(item) = outbox.recv().await {
        match item {
            Outbound::Line(line) => {
                if let Err(e) = conn.send_text(&line).await {
                    tracing::debug!(conn_id = %conn.id(), error = %e, "write failed");
                    return;
                }
            }
            Outbound::Close => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use chatterbox_transport::{ConnectionId, TransportError};

    /// In-memory connection that records writes and can be told to fail.
    #[derive(Default)]
    struct RecordingConnection {
        written: Mutex<Vec<String>>,
        closes: Mutex<usize>,
        broken: AtomicBool,
    }

    impl Connection for RecordingConnection {
        type Error = TransportError;

        async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
            self.send_text(&String::from_utf8_lossy(data)).await
        }

        async fn send_text(&self, text: &str) -> Result<(), Self::Error> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(TransportError::ConnectionClosed("broken".into()));
            }
            self.written.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
            Ok(None)
        }

        async fn close(&self) -> Result<(), Self::Error> {
            *self.closes.lock().unwrap() += 1;
            Ok(())
        }

        fn id(&self) -> ConnectionId {
            ConnectionId::new(1)
        }
    }

    /// Connection whose writes never complete, like a peer that stopped
    /// reading with a full socket buffer.
    #[derive(Default)]
    struct StalledConnection {
        closes: Mutex<usize>,
    }

    impl Connection for StalledConnection {
        type Error = TransportError;

        async fn send(&self, _data: &[u8]) -> Result<(), Self::Error> {
            std::future::pending().await
        }

        async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
            std::future::pending().await
        }

        async fn close(&self) -> Result<(), Self::Error> {
            *self.closes.lock().unwrap() += 1;
            Ok(())
        }

        fn id(&self) -> ConnectionId {
            ConnectionId::new(2)
        }
    }

    fn session(name: &str) -> (Arc<Session>, OutboundRx) {
        Session::new(SessionId(1), name)
    }

    // =====================================================================
    // send()
    // =====================================================================

    #[test]
    fn test_send_queues_line_in_order() {
        let (s, mut rx) = session("alice");

        assert!(s.send("one"));
        assert!(s.send("two"));

        assert_eq!(rx.try_recv().unwrap(), Outbound::Line("one".into()));
        assert_eq!(rx.try_recv().unwrap(), Outbound::Line("two".into()));
    }

    #[test]
    fn test_send_after_writer_gone_returns_false() {
        let (s, rx) = session("alice");
        drop(rx);

        assert!(!s.send("hello"), "a dropped outbox means the peer is gone");
        assert!(!s.is_connected());
    }

    #[test]
    fn test_send_to_full_outbox_returns_false() {
        let (s, _rx) = Session::with_capacity(SessionId(1), "alice", 2);

        assert!(s.send("one"));
        assert!(s.send("two"));
        assert!(!s.send("three"), "a full outbox means the peer is not reading");
        assert!(!s.is_connected());
        assert!(!s.send("four"));
    }

    #[tokio::test]
    async fn test_disconnected_resolves_when_send_fails() {
        let (s, rx) = session("alice");
        let waiter = tokio::spawn({
            let s = Arc::clone(&s);
            async move { s.disconnected().await }
        });
        tokio::task::yield_now().await;

        drop(rx);
        assert!(!s.send("hello"));

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("disconnected() should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_disconnected_after_the_fact_returns_immediately() {
        let (s, _rx) = session("alice");
        s.close();
        tokio::time::timeout(std::time::Duration::from_secs(1), s.disconnected())
            .await
            .expect("already disconnected");
    }

    #[test]
    fn test_send_after_close_returns_false() {
        let (s, _rx) = session("alice");
        s.close();
        assert!(!s.send("too late"));
    }

    // =====================================================================
    // close()
    // =====================================================================

    #[test]
    fn test_close_is_idempotent() {
        let (s, mut rx) = session("alice");

        s.close();
        s.close();
        s.close();

        assert_eq!(rx.try_recv().unwrap(), Outbound::Close);
        assert!(rx.try_recv().is_err(), "only one close marker is queued");
    }

    #[test]
    fn test_close_with_writer_gone_does_not_panic() {
        let (s, rx) = session("alice");
        drop(rx);
        s.close();
        assert!(!s.is_connected());
    }

    #[test]
    fn test_new_session_carries_identity() {
        let (s, _rx) = Session::new(SessionId(9), "bob");
        assert_eq!(s.id(), SessionId(9));
        assert_eq!(s.name(), "bob");
        assert!(s.is_connected());
    }

    // =====================================================================
    // spawn_writer()
    // =====================================================================

    #[tokio::test]
    async fn test_writer_flushes_queued_lines_before_close() {
        let conn = Arc::new(RecordingConnection::default());
        let (s, rx) = session("alice");

        s.send("first");
        s.send("second");
        s.close();

        spawn_writer(&s, Arc::clone(&conn), rx).await.unwrap();

        assert_eq!(*conn.written.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(*conn.closes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_writer_failure_condemns_session() {
        let conn = Arc::new(RecordingConnection::default());
        conn.broken.store(true, Ordering::SeqCst);
        let (s, rx) = session("alice");

        assert!(s.send("lost"));
        let handle = spawn_writer(&s, Arc::clone(&conn), rx);
        handle.await.unwrap();

        assert!(!s.is_connected());
        assert!(!s.send("after failure"));
    }

    #[tokio::test]
    async fn test_writer_gives_up_on_stalled_peer() {
        let conn = Arc::new(StalledConnection::default());
        let (s, rx) = Session::with_capacity(SessionId(1), "alice", 4);
        let handle = spawn_writer(&s, Arc::clone(&conn), rx);

        let line = "x".repeat(1024);
        let mut accepted = 0;
        for _ in 0..1_000 {
            if !s.send(line.as_str()) {
                break;
            }
            accepted += 1;
            tokio::task::yield_now().await;
        }

        // The outbox plus the one write in flight, never more.
        assert!(accepted <= 5, "accepted {accepted} lines for a stalled peer");
        assert!(!s.is_connected());

        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("writer should abandon the stuck write")
            .unwrap();
        assert_eq!(*conn.closes.lock().unwrap(), 0);
    }
}
