//! Routes reassembled documents to chunk queues by their root key.

use std::collections::HashSet;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc};

use chunkbridge_core::{ChunkMessage, ClassifyError};
use chunkbridge_services::{ChunkRouter, RouteError};

/// What happened to one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Routed(String),
    /// No queue for this type. `first_warning` is true the first time the
    /// type is seen.
    Unregistered {
        chunk_type: String,
        first_warning: bool,
    },
    QueueFull(String),
    Rejected(ClassifyError),
}

pub struct ChunkDispatcher {
    router: ChunkRouter,
    /// Unknown chunk types already warned about.
    warned: HashSet<String>,
}

impl ChunkDispatcher {
    pub fn new(router: ChunkRouter) -> Self {
        Self {
            router,
            warned: HashSet::new(),
        }
    }

    /// Classify one document and hand it to its queue.
    pub async fn dispatch(&mut self, document: Bytes) -> DispatchOutcome {
        let message = match ChunkMessage::parse(&document) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(error = %e, len = document.len(), "dropping unclassifiable document");
                return DispatchOutcome::Rejected(e);
            }
        };
        let chunk_type = message.chunk_type.clone();

        match self.router.send(&chunk_type, message).await {
            Ok(()) => {
                tracing::trace!(chunk_type = %chunk_type, "document routed");
                DispatchOutcome::Routed(chunk_type)
            }
            Err(RouteError::Unregistered(_)) => {
                let first_warning = self.warned.insert(chunk_type.clone());
                if first_warning {
                    tracing::warn!(
                        chunk_type = %chunk_type,
                        "no route for chunk type, dropping its documents"
                    );
                }
                DispatchOutcome::Unregistered {
                    chunk_type,
                    first_warning,
                }
            }
            Err(e @ RouteError::QueueFull(_)) => {
                tracing::warn!(chunk_type = %chunk_type, error = %e, "document dropped");
                DispatchOutcome::QueueFull(chunk_type)
            }
        }
    }

    /// Unknown chunk types seen so far.
    pub fn unknown_types(&self) -> usize {
        self.warned.len()
    }

    /// Dispatch documents until shutdown or until every sender is gone.
    pub async fn run(
        mut self,
        mut documents: mpsc::Receiver<Bytes>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!(chunk_types = self.router.registered().len(), "dispatcher started");
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("dispatcher shutting down");
                    return;
                }

                document = documents.recv() => match document {
                    Some(document) => {
                        self.dispatch(document).await;
                    }
                    None => {
                        tracing::info!("all ingest senders gone, dispatcher stopping");
                        return;
                    }
                },
            }
        }
    }
}
