//! Fan-out delivery loop: moves queued chunk messages onto one subscriber's
//! stream.
//!
//! One loop runs per subscriber, bound to one chunk type for its lifetime.
//! The loop ends when a write fails, the client closes or errors, or the
//! daemon shuts down. Inbound client data is read only to notice the close.

use std::fmt;
use std::sync::Arc;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::broadcast;
use tokio::time::Instant;

use chunkbridge_core::ChunkMessage;
use chunkbridge_services::{ChunkRouter, DeliveryStats, SendGate};

/// Why a delivery loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryEnd {
    WriteFailed(String),
    ClientClosed,
    ClientError(String),
    Shutdown,
    /// The chunk type has no queue.
    Unrouted,
}

impl fmt::Display for DeliveryEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryEnd::WriteFailed(e) => write!(f, "write failed: {e}"),
            DeliveryEnd::ClientClosed => write!(f, "client closed"),
            DeliveryEnd::ClientError(e) => write!(f, "client error: {e}"),
            DeliveryEnd::Shutdown => write!(f, "shutdown"),
            DeliveryEnd::Unrouted => write!(f, "chunk type not routed"),
        }
    }
}

pub struct DeliveryLoop {
    router: ChunkRouter,
    chunk_type: Arc<str>,
    gate: SendGate,
    stats: Arc<DeliveryStats>,
}

impl DeliveryLoop {
    pub fn new(
        router: ChunkRouter,
        chunk_type: Arc<str>,
        gate: SendGate,
        stats: Arc<DeliveryStats>,
    ) -> Self {
        Self {
            router,
            chunk_type,
            gate,
            stats,
        }
    }

    /// Run until the subscriber goes away or `shutdown` fires.
    pub async fn run<W, R, E>(
        mut self,
        mut sink: W,
        mut client: R,
        mut shutdown: broadcast::Receiver<()>,
    ) -> DeliveryEnd
    where
        W: Sink<Message> + Unpin,
        W::Error: fmt::Display,
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: fmt::Display,
    {
        let Some(_consumer) = self.router.attach(&self.chunk_type) else {
            return DeliveryEnd::Unrouted;
        };

        // Whatever is already waiting goes out at once, gate or not.
        if let Some(first) = self.router.try_receive(&self.chunk_type) {
            self.gate.mark_sent(Instant::now());
            if let Err(e) = self.write(&mut sink, first).await {
                return e;
            }
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return DeliveryEnd::Shutdown;
                }

                incoming = client.next() => match incoming {
                    None | Some(Ok(Message::Close(_))) => return DeliveryEnd::ClientClosed,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return DeliveryEnd::ClientError(e.to_string()),
                },

                message = self.router.receive(&self.chunk_type) => {
                    let Some(message) = message else {
                        return DeliveryEnd::Unrouted;
                    };
                    if !self.gate.allow() {
                        self.stats.record_dropped();
                        tracing::trace!(chunk_type = %self.chunk_type, "message inside send interval, dropped");
                        continue;
                    }
                    if let Err(e) = self.write(&mut sink, message).await {
                        return e;
                    }
                }
            }
        }
    }

    async fn write<W>(&self, sink: &mut W, message: ChunkMessage) -> Result<(), DeliveryEnd>
    where
        W: Sink<Message> + Unpin,
        W::Error: fmt::Display,
    {
        sink.send(Message::Text(message.json.into()))
            .await
            .map_err(|e| DeliveryEnd::WriteFailed(e.to_string()))?;
        self.stats.record_sent();
        Ok(())
    }
}
