//! Chunk router: the routing table from chunk type to delivery queue.
//!
//! The table is built once from configuration and its key set never changes,
//! so lookups take no lock. Each chunk type owns one bounded FIFO queue. The
//! dispatcher is the only producer; every subscriber of a chunk type consumes
//! from the same queue, so a message reaches exactly one of them.
//!
//! Consumers announce themselves with [`ChunkRouter::attach`]. A full queue
//! with no attached consumer drops new messages at once, so a chunk type
//! nobody watches never holds up the others.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};

use chunkbridge_core::config::RoutingConfig;
use chunkbridge_core::ChunkMessage;

/// One bounded queue. The receiver is shared by all subscribers of the type.
struct ChunkQueue {
    tx: mpsc::Sender<ChunkMessage>,
    rx: Mutex<mpsc::Receiver<ChunkMessage>>,
    consumers: AtomicUsize,
}

impl ChunkQueue {
    fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
            consumers: AtomicUsize::new(0),
        }
    }

    fn consumers(&self) -> usize {
        self.consumers.load(Ordering::Acquire)
    }

    fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

struct RouterInner {
    queues: HashMap<String, Arc<ChunkQueue>>,
    /// Registration order, for listings.
    names: Vec<String>,
    send_timeout: Duration,
    capacity: usize,
}

/// Shared handle to the routing table. Cheap to clone.
#[derive(Clone)]
pub struct ChunkRouter {
    inner: Arc<RouterInner>,
}

impl ChunkRouter {
    /// Build the table: one queue of `capacity` messages per chunk type.
    ///
    /// Repeated names share a single queue.
    pub fn new<I, S>(chunk_types: I, capacity: usize, send_timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let capacity = capacity.max(1);
        let mut queues = HashMap::new();
        let mut names = Vec::new();
        for name in chunk_types {
            let name = name.into();
            if queues.contains_key(&name) {
                continue;
            }
            tracing::info!(
                chunk_type = %name,
                capacity,
                "registering chunk type in routing table"
            );
            queues.insert(name.clone(), Arc::new(ChunkQueue::new(capacity)));
            names.push(name);
        }
        Self {
            inner: Arc::new(RouterInner {
                queues,
                names,
                send_timeout,
                capacity,
            }),
        }
    }

    pub fn from_config(config: &RoutingConfig) -> Self {
        Self::new(
            config.registered_chunks.iter().cloned(),
            config.queue_capacity,
            config.send_timeout(),
        )
    }

    /// Enqueue `message` on the queue for `chunk_type`.
    ///
    /// An unregistered type fails at once and leaves every queue untouched.
    /// A full queue with no attached consumer drops the message at once with
    /// `QueueFull`. Otherwise the call waits up to the configured send timeout
    /// for a consumer to make room, then drops the message with `QueueFull`.
    pub async fn send(&self, chunk_type: &str, message: ChunkMessage) -> Result<(), RouteError> {
        let queue = self
            .inner
            .queues
            .get(chunk_type)
            .ok_or_else(|| RouteError::Unregistered(chunk_type.to_string()))?;

        // The router owns every receiver, so the channel is never closed.
        let message = match queue.tx.try_send(message) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(message)) | Err(TrySendError::Closed(message)) => message,
        };

        if queue.consumers() == 0 {
            return Err(RouteError::QueueFull(chunk_type.to_string()));
        }

        match tokio::time::timeout(self.inner.send_timeout, queue.tx.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) | Err(_) => Err(RouteError::QueueFull(chunk_type.to_string())),
        }
    }

    /// Register a consumer of `chunk_type` for as long as the guard lives.
    ///
    /// Returns `None` for an unregistered type.
    pub fn attach(&self, chunk_type: &str) -> Option<ConsumerGuard> {
        let queue = self.inner.queues.get(chunk_type)?;
        queue.consumers.fetch_add(1, Ordering::AcqRel);
        Some(ConsumerGuard {
            queue: queue.clone(),
        })
    }

    /// Attached consumers of `chunk_type`, `None` if unregistered.
    pub fn consumers(&self, chunk_type: &str) -> Option<usize> {
        self.inner.queues.get(chunk_type).map(|q| q.consumers())
    }

    /// Wait for the next message of `chunk_type`.
    ///
    /// Returns `None` at once for an unregistered type. Cancel-safe: dropping
    /// the future never loses a message.
    pub async fn receive(&self, chunk_type: &str) -> Option<ChunkMessage> {
        let queue = self.inner.queues.get(chunk_type)?;
        let mut rx = queue.rx.lock().await;
        rx.recv().await
    }

    /// Take a message of `chunk_type` if one is queued right now.
    ///
    /// Returns `None` when the queue is empty, when another subscriber is
    /// currently receiving from it, or when the type is unregistered.
    pub fn try_receive(&self, chunk_type: &str) -> Option<ChunkMessage> {
        let queue = self.inner.queues.get(chunk_type)?;
        let mut rx = queue.rx.try_lock().ok()?;
        rx.try_recv().ok()
    }

    pub fn is_registered(&self, chunk_type: &str) -> bool {
        self.inner.queues.contains_key(chunk_type)
    }

    /// Registered chunk types in configuration order.
    pub fn registered(&self) -> &[String] {
        &self.inner.names
    }

    /// Messages waiting for `chunk_type`, `None` if unregistered.
    pub fn queued(&self, chunk_type: &str) -> Option<usize> {
        self.inner.queues.get(chunk_type).map(|q| q.queued())
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

/// A live consumer of one chunk type. Detaches when dropped.
pub struct ConsumerGuard {
    queue: Arc<ChunkQueue>,
}

impl Drop for ConsumerGuard {
    fn drop(&mut self) {
        self.queue.consumers.fetch_sub(1, Ordering::AcqRel);
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("chunk type {0:?} is not registered")]
    Unregistered(String),

    #[error("queue for chunk type {0:?} stayed full, message dropped")]
    QueueFull(String),
}
