//! chunkbridged: binary chunk stream to WebSocket bridge daemon.

use std::path::PathBuf;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use chunkbridge_core::BridgeConfig;
use chunkbridged::Daemon;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = match BridgeConfig::load(path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "cannot start without a valid configuration");
            return Err(e.into());
        }
    };
    tracing::info!(
        ingest = %config.ingest.listen_addr,
        subscribers = %config.subscribers.listen_addr,
        chunk_types = ?config.routing.registered_chunks,
        "chunkbridged starting"
    );

    let daemon = Daemon::bind(config).await?;

    {
        let shutdown = daemon.shutdown_handle();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    daemon.run().await
}
