//! Message routing: broadcast, whisper, and roster.
//!
//! The dispatcher turns a decoded [`ClientMessage`] into deliveries. It
//! owns no state of its own; everything goes through the shared
//! [`Registry`].
//!
//! # Delivery rules
//!
//! - The registry lock is held only long enough to take a snapshot.
//!   Writes happen afterwards, one session at a time, and a session's
//!   `send` only queues onto its outbox, so a stalled peer cannot hold up
//!   anyone else.
//! - A failed write condemns the session: it is removed from the registry
//!   on the spot. Delivery to the remaining recipients carries on.
//! - Broadcast order is newest session first.

use std::sync::Arc;

use chatterbox_protocol::{ClientMessage, ProtocolLine, SessionId, Verb};
use chatterbox_session::{Registry, Session};
use chrono::{DateTime, Local};

use crate::lines;

/// Something everyone in the room should see.
///
/// The kind is explicit, so the wording of a chat message never changes
/// how it is classified or logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A user completed their handshake.
    Joined(String),
    /// A user's session ended.
    Left(String),
    /// A user said something to the room.
    Chat { from: String, text: String },
}

impl Notice {
    fn body(&self) -> String {
        match self {
            Self::Joined(name) => lines::joined(name),
            Self::Left(name) => lines::left(name),
            Self::Chat { from, text } => lines::chat(from, text),
        }
    }

    /// The protocol event logged for each recipient.
    fn delivered_to(&self, recipient: &str) -> ProtocolLine {
        match self {
            Self::Joined(name) => {
                ProtocolLine::outbound(recipient, Verb::UserJoined).arg(name)
            }
            Self::Left(name) => {
                ProtocolLine::outbound(recipient, Verb::UserLeft).arg(name)
            }
            Self::Chat { from, text } => {
                ProtocolLine::outbound(recipient, Verb::ChatReceived)
                    .arg(from)
                    .arg(text)
            }
        }
    }
}

/// What the session loop should do after a message is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading.
    Continue,
    /// The client asked to leave; wind the session down.
    Disconnect,
}

/// One row of the user roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: SessionId,
    pub name: String,
    pub joined_at: DateTime<Local>,
}

/// Routes client messages to the sessions in a [`Registry`].
///
/// Cheap to clone: it is just a handle on the shared registry.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// The registry this dispatcher delivers to.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Delivers `notice`, timestamped, to every registered session.
    ///
    /// Best effort: a recipient whose write fails is removed and skipped,
    /// and the others still get the line. Returns the number of
    /// successful deliveries.
    pub async fn broadcast(&self, notice: &Notice) -> usize {
        let line = lines::stamped(&notice.body());
        let recipients = self.registry.snapshot().await;

        let mut delivered = 0;
        for session in recipients.iter().rev() {
            if session.send(line.as_str()) {
                delivered += 1;
                tracing::info!("{}", notice.delivered_to(session.name()));
            } else {
                self.condemn(session).await;
            }
        }
        delivered
    }

    /// Delivers `text` privately from `from` to the session named `target`.
    ///
    /// Returns `false` if nobody by that name is registered, or if the
    /// write to them failed (in which case they are removed). The caller
    /// is responsible for telling the sender. On success the sender gets
    /// a confirmation line.
    ///
    /// With duplicate names, the session that joined first receives it.
    pub async fn whisper(&self, from: &Session, target: &str, text: &str) -> bool {
        let Some(recipient) = self.registry.find_by_name(target).await else {
            return false;
        };

        if !recipient.send(lines::stamped(&lines::whisper(from.name(), text))) {
            self.condemn(&recipient).await;
            return false;
        }
        tracing::info!(
            "{}",
            ProtocolLine::outbound(recipient.name(), Verb::WhisperReceived)
                .arg(from.name())
                .arg(text)
        );

        if from.send(lines::stamped(&lines::whisper_sent(target, text))) {
            tracing::info!(
                "{}",
                ProtocolLine::inbound(from.name(), Verb::WhisperSent)
                    .arg(target)
                    .arg(text)
            );
        } else {
            self.condemn(from).await;
        }
        true
    }

    /// Returns the current roster, oldest session first.
    pub async fn list_users(&self) -> Vec<RosterEntry> {
        self.registry
            .snapshot()
            .await
            .iter()
            .map(|s| RosterEntry {
                id: s.id(),
                name: s.name().to_string(),
                joined_at: s.joined_at(),
            })
            .collect()
    }

    /// Writes the roster to `to`: a header line, then one line per user.
    pub async fn send_roster(&self, to: &Session) {
        let roster = self.list_users().await;

        let mut ok = to.send(lines::roster_header(Local::now()));
        for (i, entry) in roster.iter().enumerate() {
            if !ok {
                break;
            }
            ok = to.send(lines::roster_entry(i + 1, &entry.name, entry.joined_at));
        }

        if !ok {
            self.condemn(to).await;
            return;
        }
        let line = roster
            .iter()
            .fold(ProtocolLine::outbound(to.name(), Verb::Users), |line, e| {
                line.arg(&e.name)
            });
        tracing::info!("{line}");
    }

    /// Tells `to` that its last command made no sense.
    pub async fn reject(&self, to: &Session, input: &str) {
        tracing::info!(
            "{}",
            ProtocolLine::outbound(to.name(), Verb::Error).arg(input)
        );
        if !to.send(lines::unrecognized_command()) {
            self.condemn(to).await;
        }
    }

    /// Routes one message from `session`.
    ///
    /// | message        | action                              |
    /// |----------------|-------------------------------------|
    /// | `SEND_CHAT`    | [`broadcast`](Self::broadcast)      |
    /// | `SEND_WHISPER` | [`whisper`](Self::whisper)          |
    /// | `LIST_USERS`   | [`send_roster`](Self::send_roster)  |
    /// | `DISCONNECT`   | returns [`Flow::Disconnect`]        |
    /// | `ERROR`        | [`reject`](Self::reject)            |
    pub async fn route(&self, session: &Arc<Session>, msg: ClientMessage) -> Flow {
        let name = session.name();
        match msg {
            ClientMessage::SendChat { text } => {
                tracing::info!("{}", ProtocolLine::inbound(name, Verb::SendChat).arg(&text));
                let notice = Notice::Chat {
                    from: name.to_string(),
                    text,
                };
                self.broadcast(&notice).await;
            }
            ClientMessage::SendWhisper { to, text } => {
                tracing::info!(
                    "{}",
                    ProtocolLine::inbound(name, Verb::SendWhisper)
                        .arg(&to)
                        .arg(&text)
                );
                if !self.whisper(session, &to, &text).await
                    && !session.send(lines::no_such_user())
                {
                    self.condemn(session).await;
                }
            }
            ClientMessage::ListUsers => {
                tracing::info!("{}", ProtocolLine::inbound(name, Verb::ListUsers));
                self.send_roster(session).await;
            }
            ClientMessage::Disconnect => {
                tracing::info!("{}", ProtocolLine::inbound(name, Verb::Disconnect));
                return Flow::Disconnect;
            }
            ClientMessage::Error { input } => {
                self.reject(session, &input).await;
            }
        }
        Flow::Continue
    }

    /// Removes a session whose write just failed.
    async fn condemn(&self, session: &Session) {
        if self.registry.remove_by_id(session.id()).await {
            tracing::info!(
                session_id = %session.id(),
                "Disconnected Client {} removed from list.",
                session.name()
            );
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
