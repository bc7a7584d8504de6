//! The registry: every session currently in the chat room.
//!
//! The registry is the single piece of state shared between session
//! tasks. Adding, removing, looking up by name, and listing who is here
//! each happen under one lock.
//!
//! # Concurrency note
//!
//! Every method takes the lock, does its bookkeeping, and releases it
//! before returning. Nothing here awaits I/O while holding the lock, and
//! [`snapshot`](Registry::snapshot) hands back an owned copy so callers
//! can fan out writes with the lock already released.
//!
//! # Ordering
//!
//! Sessions are kept in insertion order. That order defines:
//! - the roster order returned by `snapshot`;
//! - the tie-break for duplicate names in `find_by_name` (oldest wins).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chatterbox_protocol::SessionId;
use tokio::sync::Mutex;

use crate::Session;

/// Thread-safe collection of active sessions.
///
/// Create one per relay and share it with `Arc`; there is no global
/// instance.
#[derive(Debug)]
pub struct Registry {
    /// Active sessions in insertion order.
    ///
    /// A chat room holds tens of users, not thousands, so a `Vec` scan
    /// beats keeping two maps in sync.
    sessions: Mutex<Vec<Arc<Session>>>,

    /// Source of session ids. Starts at 1 and never repeats.
    next_id: AtomicU64,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocates a fresh, never-before-used session id.
    pub fn next_id(&self) -> SessionId {
        SessionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Adds a session. It receives broadcasts from now on.
    ///
    /// Adding a session whose id is already present replaces the old
    /// entry in place instead of listing it twice.
    pub async fn add(&self, session: Arc<Session>) {
        let mut sessions = self.sessions.lock().await;
        let id = session.id();
        match sessions.iter_mut().find(|s| s.id() == id) {
            Some(slot) => *slot = session,
            None => sessions.push(session),
        }
        tracing::debug!(session_id = %id, count = sessions.len(), "session registered");
    }

    /// Removes the session with `id`.
    ///
    /// Returns whether it was present. Removing an absent id is not an
    /// error: a session can be removed both by a failed broadcast write
    /// and by its own loop shutting down, in either order.
    pub async fn remove_by_id(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.iter().position(|s| s.id() == id) {
            Some(index) => {
                sessions.remove(index);
                tracing::debug!(session_id = %id, count = sessions.len(), "session removed");
                true
            }
            None => false,
        }
    }

    /// Finds a session by display name.
    ///
    /// Names are not unique. When several sessions share a name, the one
    /// that joined first is returned.
    pub async fn find_by_name(&self, name: &str) -> Option<Arc<Session>> {
        self.sessions
            .lock()
            .await
            .iter()
            .find(|s| s.name() == name)
            .cloned()
    }

    /// Returns an owned copy of the current membership, oldest first.
    ///
    /// The copy is detached from the registry: sessions joining or
    /// leaving afterwards don't affect it.
    pub async fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.lock().await.clone()
    }

    /// Returns the number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Returns `true` if nobody is connected.
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Closes every registered session. Used at relay shutdown.
    ///
    /// Entries stay in the registry; each session loop removes its own
    /// entry as it winds down. Returns how many sessions were closed.
    pub async fn close_all(&self) -> usize {
        let sessions = self.snapshot().await;
        for session in &sessions {
            session.close();
        }
        sessions.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
