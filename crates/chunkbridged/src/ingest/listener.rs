//! TCP accept loop for binary frame producers.

use std::net::SocketAddr;

use anyhow::Result;
use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

use super::connection::{ConnectionEnd, ConnectionReader};

pub struct IngestListener {
    listener: TcpListener,
    documents: mpsc::Sender<Bytes>,
    read_buffer_bytes: usize,
    max_document_bytes: usize,
    shutdown: broadcast::Sender<()>,
}

impl IngestListener {
    pub fn new(
        listener: TcpListener,
        documents: mpsc::Sender<Bytes>,
        read_buffer_bytes: usize,
        max_document_bytes: usize,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            listener,
            documents,
            read_buffer_bytes,
            max_document_bytes,
            shutdown,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until shutdown. Each connection gets its own reader
    /// task and session state.
    pub async fn run(self) -> Result<()> {
        let mut shutdown = self.shutdown.subscribe();
        tracing::info!(addr = %self.listener.local_addr()?, "ingest listener started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("ingest listener shutting down");
                    return Ok(());
                }

                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(a) => a,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(peer = %peer, error = %e, "set_nodelay failed");
                    }
                    tracing::info!(peer = %peer, "ingest connection accepted");

                    let reader = ConnectionReader::new(
                        stream,
                        peer,
                        self.documents.clone(),
                        self.read_buffer_bytes,
                        self.max_document_bytes,
                        self.shutdown.subscribe(),
                    );
                    tokio::spawn(async move {
                        match reader.run().await {
                            ConnectionEnd::Corrupt(e) => {
                                tracing::warn!(peer = %peer, error = %e, "ingest connection dropped");
                            }
                            end => {
                                tracing::info!(peer = %peer, reason = %end, "ingest connection closed");
                            }
                        }
                    });
                }
            }
        }
    }
}
