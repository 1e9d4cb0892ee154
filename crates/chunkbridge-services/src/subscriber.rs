//! Subscriber table: live stream connections and their delivery counters.
//!
//! An entry exists exactly as long as its `SubscriberHandle`; dropping the
//! handle removes it, so a delivery loop cannot leak its registration.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;

/// Per-subscriber counters, updated by its delivery loop.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    sent: AtomicU64,
    dropped: AtomicU64,
}

impl DeliveryStats {
    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// A connected subscriber.
#[derive(Debug, Clone)]
pub struct SubscriberEntry {
    pub id: u64,
    pub chunk_type: String,
    pub peer_addr: SocketAddr,
    pub connected_at: Instant,
    pub stats: Arc<DeliveryStats>,
}

/// The subscriber table, shared between stream handlers and the status API.
#[derive(Clone, Default)]
pub struct SubscriberTable {
    next_id: Arc<AtomicU64>,
    entries: Arc<DashMap<u64, SubscriberEntry>>,
}

impl SubscriberTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new subscriber of `chunk_type`.
    pub fn register(&self, chunk_type: &str, peer_addr: SocketAddr) -> SubscriberHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let stats = Arc::new(DeliveryStats::default());
        self.entries.insert(
            id,
            SubscriberEntry {
                id,
                chunk_type: chunk_type.to_string(),
                peer_addr,
                connected_at: Instant::now(),
                stats: stats.clone(),
            },
        );
        SubscriberHandle {
            id,
            stats,
            table: self.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Subscribers currently attached to `chunk_type`.
    pub fn count(&self, chunk_type: &str) -> usize {
        self.entries
            .iter()
            .filter(|e| e.value().chunk_type == chunk_type)
            .count()
    }

    /// Snapshot of all subscribers, ordered by id.
    pub fn snapshot(&self) -> Vec<SubscriberEntry> {
        let mut all: Vec<_> = self.entries.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|e| e.id);
        all
    }
}

/// Registration of one subscriber. Removes the entry when dropped.
pub struct SubscriberHandle {
    id: u64,
    stats: Arc<DeliveryStats>,
    table: SubscriberTable,
}

impl SubscriberHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn stats(&self) -> &Arc<DeliveryStats> {
        &self.stats
    }
}

impl Drop for SubscriberHandle {
    fn drop(&mut self) {
        self.table.entries.remove(&self.id);
    }
}
