//! `RelayServer` builder and accept loop.
//!
//! This is the entry point for running a Chatterbox relay. It ties
//! together all the layers: transport → protocol → session → dispatcher.

use std::sync::Arc;
use std::time::Duration;

use chatterbox_protocol::JsonCodec;
use chatterbox_session::Registry;
use chatterbox_transport::{Connection, Transport, TransportError, Upgrade, WebSocketTransport};
use tokio::task::{JoinError, JoinSet};

use crate::config::RelayConfig;
use crate::dispatcher::Dispatcher;
use crate::handler::SessionLoop;
use crate::ChatterboxError;

/// Builder for configuring and starting a relay.
///
/// # Example
///
/// ```rust,no_run
/// use chatterbox::prelude::*;
///
/// # async fn start() -> Result<(), ChatterboxError> {
/// let server = RelayServer::builder()
///     .bind("0.0.0.0:6789")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RelayServerBuilder {
    config: RelayConfig,
}

impl RelayServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: RelayConfig::default(),
        }
    }

    /// Sets the address to bind the relay to.
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    /// Sets how long a new connection gets for its WebSocket upgrade and
    /// again for its display name.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Sets how long shutdown waits for sessions to wind down.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    /// Sets how many lines may queue for one slow client before it is
    /// disconnected.
    pub fn outbox_capacity(mut self, capacity: usize) -> Self {
        self.config.outbox_capacity = capacity;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener.
    ///
    /// # Errors
    /// Returns [`ChatterboxError::Transport`] if the address cannot be
    /// bound. This is the only error that should stop the process.
    pub async fn build(self) -> Result<RelayServer, ChatterboxError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        let registry = Arc::new(Registry::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry));

        Ok(RelayServer {
            transport,
            registry,
            dispatcher,
            config: self.config,
        })
    }
}

impl Default for RelayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound relay, ready to accept clients.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to
/// start accepting connections.
pub struct RelayServer {
    transport: WebSocketTransport,
    registry: Arc<Registry>,
    dispatcher: Dispatcher,
    config: RelayConfig,
}

impl RelayServer {
    /// Creates a new builder.
    pub fn builder() -> RelayServerBuilder {
        RelayServerBuilder::new()
    }

    /// Returns the local address the relay is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The registry of connected sessions.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), ChatterboxError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// The loop itself only accepts sockets. Each one gets its own task
    /// that performs the WebSocket upgrade (bounded by
    /// [`handshake_timeout`](RelayConfig::handshake_timeout)) and then
    /// runs a [`SessionLoop`], so a peer that connects and goes quiet
    /// holds up nobody but itself. A failed accept is logged and the loop
    /// keeps going.
    ///
    /// On shutdown the listener is closed, every registered session is
    /// closed, and session tasks get
    /// [`shutdown_grace`](RelayConfig::shutdown_grace) to finish before
    /// they are aborted.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ChatterboxError>
    where
        F: Future<Output = ()>,
    {
        let Self {
            mut transport,
            registry,
            dispatcher,
            config,
        } = self;
        let config = Arc::new(config);
        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        tracing::info!(addr = %config.bind_addr, "Chatterbox relay running");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = transport.accept() => match accepted {
                    Ok(pending) => {
                        tasks.spawn(serve(pending, dispatcher.clone(), Arc::clone(&config)));
                    }
                    Err(TransportError::Shutdown) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }

            // Reap finished sessions without blocking the accept loop.
            while let Some(result) = tasks.try_join_next() {
                log_task_exit(result);
            }
        }

        tracing::info!("shutting down");
        if let Err(e) = transport.shutdown().await {
            tracing::debug!(error = %e, "transport shutdown failed");
        }
        drop(transport);

        let closed = registry.close_all().await;
        tracing::info!(sessions = closed, "closed all sessions");

        let drained = tokio::time::timeout(config.shutdown_grace, async {
            while let Some(result) = tasks.join_next().await {
                log_task_exit(result);
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!(remaining = tasks.len(), "aborting sessions after grace period");
            tasks.abort_all();
        }

        tracing::info!("relay stopped");
        Ok(())
    }
}

/// Upgrades one accepted socket and runs its session to completion.
async fn serve<P>(pending: P, dispatcher: Dispatcher, config: Arc<RelayConfig>)
where
    P: Upgrade<Error = TransportError>,
    P::Connection: Connection<Error = TransportError>,
{
    let conn_id = pending.id();
    let conn = match tokio::time::timeout(config.handshake_timeout, pending.upgrade()).await {
        Ok(Ok(conn)) => conn,
        Ok(Err(e)) => {
            tracing::debug!(%conn_id, error = %e, "WebSocket upgrade failed");
            return;
        }
        Err(_) => {
            tracing::debug!(%conn_id, "WebSocket upgrade timed out");
            return;
        }
    };

    let session = SessionLoop::new(conn, dispatcher, JsonCodec, &config);
    if let Err(e) = session.run().await {
        tracing::debug!(%conn_id, error = %e, "session ended with error");
    }
}

fn log_task_exit(result: Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            tracing::error!(error = %e, "session task panicked");
        }
    }
}
