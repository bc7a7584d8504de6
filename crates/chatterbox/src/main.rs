use chatterbox::prelude::*;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ChatterboxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_timer(ChronoLocal::new("%-I:%M %p".to_string()))
        .with_target(false)
        .init();

    let mut builder = RelayServer::builder();
    if let Ok(addr) = std::env::var("CHATTERBOX_BIND") {
        builder = builder.bind(addr);
    }

    let server = match builder.build().await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "failed to start relay");
            return Err(e);
        }
    };
    if let Ok(addr) = server.local_addr() {
        tracing::info!(%addr, "listening");
    }

    server.run_until(shutdown_signal()).await
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                wait_for_ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = wait_for_ctrl_c() => {}
            _ = terminate.recv() => {
                tracing::info!("received SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C"),
        Err(e) => {
            tracing::info!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}
