//! Session tracking for Chatterbox.
//!
//! This crate handles the relay-side state of every connected client:
//!
//! 1. **Sessions**: one [`Session`] per connected client, wrapping the
//!    write side of its channel behind a non-failing `send`.
//! 2. **Registry**: the shared, internally synchronized collection of
//!    active sessions ([`Registry`]). Membership in the registry is the
//!    sole authority for who receives broadcasts.
//! 3. **Names**: validation of the display name a client offers during
//!    its handshake ([`validate_display_name`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Relay (above)     ← dispatches chat/whisper/roster through the registry
//!     ↕
//! Session (this crate) ← who is connected, and how to reach them
//!     ↕
//! Transport (below) ← the raw duplex channel each session writes to
//! ```

mod error;
mod name;
mod registry;
mod session;

pub use error::SessionError;
pub use name::{validate_display_name, MAX_DISPLAY_NAME_LEN};
pub use registry::Registry;
pub use session::{spawn_writer, Outbound, OutboundRx, Session, DEFAULT_OUTBOX_CAPACITY};
