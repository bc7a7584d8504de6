//! The relay's protocol vocabulary.
//!
//! Every request the relay handles and every delivery it makes is
//! reported as a [`ProtocolLine`]: a direction arrow, who it concerns,
//! a [`Verb`], and `::`-separated arguments.
//!
//! ```text
//! <<alice: send_chat::hi          (alice asked the relay to broadcast "hi")
//! >>bob: chat_received::alice::hi (the relay delivered it to bob)
//! ```

use std::fmt;

/// Separates a verb from its arguments, and arguments from each other.
pub const SEPARATOR: &str = "::";

/// A named protocol event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    // -- client → relay --
    Connect,
    Disconnect,
    SendChat,
    SendWhisper,
    ListUsers,

    // -- relay → client --
    Connected,
    Disconnected,
    ChatReceived,
    WhisperReceived,
    WhisperSent,
    Users,
    UserJoined,
    UserLeft,
    Error,
    FatalError,
}

impl Verb {
    /// The wire spelling of the verb.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::SendChat => "send_chat",
            Self::SendWhisper => "send_whisper",
            Self::ListUsers => "list_users",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::ChatReceived => "chat_received",
            Self::WhisperReceived => "whisper_received",
            Self::WhisperSent => "whisper_sent",
            Self::Users => "users",
            Self::UserJoined => "user_joined",
            Self::UserLeft => "user_left",
            Self::Error => "error",
            Self::FatalError => "fatal_error",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which way a protocol event travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// A request that reached the relay (`<<`).
    Inbound,
    /// Something the relay sent or did on a session's behalf (`>>`).
    Outbound,
}

impl Direction {
    fn arrow(self) -> &'static str {
        match self {
            Self::Inbound => "<<",
            Self::Outbound => ">>",
        }
    }
}

/// One formatted protocol event, ready to be logged.
///
/// Build it with [`ProtocolLine::inbound`] / [`ProtocolLine::outbound`]
/// and chain [`arg`](ProtocolLine::arg) for each argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolLine {
    direction: Direction,
    subject: String,
    verb: Verb,
    args: Vec<String>,
}

impl ProtocolLine {
    /// A request from `subject` to the relay.
    pub fn inbound(subject: impl Into<String>, verb: Verb) -> Self {
        Self::new(Direction::Inbound, subject, verb)
    }

    /// A delivery or state change from the relay to `subject`.
    pub fn outbound(subject: impl Into<String>, verb: Verb) -> Self {
        Self::new(Direction::Outbound, subject, verb)
    }

    fn new(direction: Direction, subject: impl Into<String>, verb: Verb) -> Self {
        Self {
            direction,
            subject: subject.into(),
            verb,
            args: Vec::new(),
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, value: impl fmt::Display) -> Self {
        self.args.push(value.to_string());
        self
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }
}

impl fmt::Display for ProtocolLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}: {}", self.direction.arrow(), self.subject, self.verb)?;
        for arg in &self.args {
            write!(f, "{SEPARATOR}{arg}")?;
        }
        Ok(())
    }
}
