//! Relay configuration.

use std::time::Duration;

use chatterbox_protocol::PORT;
use chatterbox_session::DEFAULT_OUTBOX_CAPACITY;

/// Settings for a [`RelayServer`](crate::RelayServer).
///
/// Start from `RelayConfig::default()` and override what you need, or use
/// the [`RelayServerBuilder`](crate::RelayServerBuilder) setters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address to listen on. Default: `0.0.0.0:6789`.
    pub bind_addr: String,

    /// How long a new connection gets for each handshake step: the
    /// WebSocket upgrade, then the display name. A connection that misses
    /// either is dropped and never enters the registry.
    ///
    /// Default: 10 seconds.
    pub handshake_timeout: Duration,

    /// On shutdown, how long to wait for session tasks to finish their
    /// leave notices before they are aborted.
    ///
    /// Default: 5 seconds.
    pub shutdown_grace: Duration,

    /// Lines that may wait in one session's outbox. A peer that falls
    /// this far behind is disconnected.
    ///
    /// Default: 1024.
    pub outbox_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{PORT}"),
            handshake_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(5),
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
        }
    }
}
