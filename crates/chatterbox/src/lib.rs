//! # Chatterbox
//!
//! A multi-user text chat relay.
//!
//! Clients connect, announce a display name, and then exchange three kinds
//! of traffic through the relay: room-wide chat, private whispers, and
//! roster requests. The relay keeps a [`Registry`] of who is connected and
//! fans each message out to the right sessions.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatterbox::prelude::*;
//!
//! # async fn start() -> Result<(), ChatterboxError> {
//! let server = RelayServer::builder()
//!     .bind("127.0.0.1:6789")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! [`Registry`]: chatterbox_session::Registry

mod config;
mod dispatcher;
mod error;
mod handler;
mod lines;
mod server;

pub use config::RelayConfig;
pub use dispatcher::{Dispatcher, Flow, Notice, RosterEntry};
pub use error::ChatterboxError;
pub use handler::SessionLoop;
pub use server::{RelayServer, RelayServerBuilder};

/// Everything needed to run a relay or drive its parts directly.
pub mod prelude {
    pub use crate::{
        ChatterboxError, Dispatcher, Flow, Notice, RelayConfig, RelayServer,
        RelayServerBuilder, RosterEntry, SessionLoop,
    };
    pub use chatterbox_protocol::{ClientMessage, Codec, JsonCodec, SessionId, PORT};
    pub use chatterbox_session::{Registry, Session};
    pub use chatterbox_transport::{Connection, Transport};
}
