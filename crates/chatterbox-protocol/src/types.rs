//! Core protocol types for Chatterbox's wire format.
//!
//! Everything in here travels client → relay. The relay answers with plain
//! text lines, so there is no server-side counterpart to [`ClientMessage`].

use serde::{Deserialize, Serialize};

use std::fmt;

/// The TCP port the relay listens on unless told otherwise.
pub const PORT: u16 = 6789;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A unique identifier for one connected session.
///
/// Display names are not unique, so this is the only stable key for a
/// session. Ids are never reused within a relay process: a user who
/// reconnects gets a brand new id.
///
/// `#[serde(transparent)]` serializes this as just the inner `u64`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// The category of a client request, without its payload.
///
/// Handy for logging and metrics-style matching where the payload is
/// irrelevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Chat,
    Whisper,
    List,
    Disconnect,
    Error,
}

// ---------------------------------------------------------------------------
// ClientMessage
// ---------------------------------------------------------------------------

/// A request from a connected client to the relay.
///
/// This is a *closed* set: anything a client can ask for is one of these
/// variants, and anything that doesn't decode into one of them is a
/// protocol error.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON, and
/// `rename_all = "SCREAMING_SNAKE_CASE"` gives the tags their wire names:
///
/// ```text
/// { "type": "SEND_CHAT", "text": "hi" }
/// { "type": "SEND_WHISPER", "to": "bob", "text": "hello" }
/// { "type": "LIST_USERS" }
/// { "type": "DISCONNECT" }
/// { "type": "ERROR", "input": "/dance" }
/// ```
///
/// Whispers carry the target and body as separate fields, so a target
/// name containing spaces is routed correctly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Broadcast `text` to everyone in the chat room.
    SendChat { text: String },

    /// Deliver `text` privately to the session named `to`.
    SendWhisper { to: String, text: String },

    /// Ask for the roster of connected users.
    ListUsers,

    /// Leave the chat room and close the connection.
    Disconnect,

    /// The client could not make sense of local input and is forwarding
    /// it so the relay can answer with an explanation.
    Error {
        #[serde(default)]
        input: String,
    },
}

impl ClientMessage {
    /// Returns the payload-free category of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::SendChat { .. } => MessageKind::Chat,
            Self::SendWhisper { .. } => MessageKind::Whisper,
            Self::ListUsers => MessageKind::List,
            Self::Disconnect => MessageKind::Disconnect,
            Self::Error { .. } => MessageKind::Error,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
