//! Process wiring: binds both listeners, spawns the long-lived tasks and
//! waits for shutdown.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

use chunkbridge_api::ApiState;
use chunkbridge_core::BridgeConfig;
use chunkbridge_services::{ChunkRouter, SubscriberTable};

use crate::dispatch::ChunkDispatcher;
use crate::ingest::IngestListener;

/// A bound, not yet running daemon.
pub struct Daemon {
    config: BridgeConfig,
    ingest: TcpListener,
    http: TcpListener,
    router: ChunkRouter,
    subscribers: SubscriberTable,
    shutdown: broadcast::Sender<()>,
}

impl Daemon {
    pub async fn bind(config: BridgeConfig) -> Result<Self> {
        let ingest = TcpListener::bind(&config.ingest.listen_addr)
            .await
            .with_context(|| format!("failed to bind ingest listener on {}", config.ingest.listen_addr))?;
        let http = TcpListener::bind(&config.subscribers.listen_addr)
            .await
            .with_context(|| {
                format!(
                    "failed to bind subscriber endpoint on {}",
                    config.subscribers.listen_addr
                )
            })?;

        let router = ChunkRouter::from_config(&config.routing);
        let (shutdown, _) = broadcast::channel::<()>(1);

        Ok(Self {
            config,
            ingest,
            http,
            router,
            subscribers: SubscriberTable::new(),
            shutdown,
        })
    }

    pub fn ingest_addr(&self) -> Result<SocketAddr> {
        Ok(self.ingest.local_addr()?)
    }

    pub fn subscriber_addr(&self) -> Result<SocketAddr> {
        Ok(self.http.local_addr()?)
    }

    /// Sending on this stops the daemon.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown.clone()
    }

    pub fn router(&self) -> &ChunkRouter {
        &self.router
    }

    pub fn subscribers(&self) -> &SubscriberTable {
        &self.subscribers
    }

    /// Run until shutdown is signalled or a core task exits.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.shutdown.subscribe();

        let (document_tx, document_rx) =
            mpsc::channel(self.config.ingest.max_pending_documents.max(1));

        let ingest_task = tokio::spawn(
            IngestListener::new(
                self.ingest,
                document_tx,
                self.config.ingest.read_buffer_bytes,
                self.config.ingest.max_document_bytes,
                self.shutdown.clone(),
            )
            .run(),
        );

        let dispatcher_task = tokio::spawn(
            ChunkDispatcher::new(self.router.clone()).run(document_rx, self.shutdown.subscribe()),
        );

        let state = ApiState::new(
            self.router.clone(),
            self.subscribers.clone(),
            &self.config.subscribers,
            self.shutdown.clone(),
        );
        let api_task = tokio::spawn(chunkbridge_api::serve(state, self.http));

        tokio::select! {
            _ = shutdown_rx.recv()  => tracing::info!("shutting down"),
            r = ingest_task         => tracing::error!("ingest listener exited: {:?}", r),
            r = dispatcher_task     => tracing::error!("dispatcher exited: {:?}", r),
            r = api_task            => tracing::error!("subscriber endpoint exited: {:?}", r),
        }

        // Wake anything still running if a task died on its own.
        let _ = self.shutdown.send(());
        Ok(())
    }
}
