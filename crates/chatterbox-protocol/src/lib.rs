//! Wire protocol for Chatterbox.
//!
//! This crate defines the "language" that chat clients and the relay speak:
//!
//! - **Types** ([`ClientMessage`], [`MessageKind`], [`SessionId`]): the
//!   structured requests a client sends after its handshake.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those requests are
//!   converted to/from bytes.
//! - **Vocabulary** ([`Verb`], [`ProtocolLine`]): the named protocol events
//!   the relay reports in its log (`send_chat`, `user_joined`, ...).
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Direction matters
//!
//! ```text
//! client → relay : bare display name (handshake), then ClientMessage frames
//! relay → client : pre-formatted, timestamped text lines
//! ```
//!
//! Only the client → relay direction is structured; the relay never sends
//! a `ClientMessage` back.

mod codec;
mod error;
mod types;
mod verbs;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{ClientMessage, MessageKind, SessionId, PORT};
pub use verbs::{Direction, ProtocolLine, Verb, SEPARATOR};
