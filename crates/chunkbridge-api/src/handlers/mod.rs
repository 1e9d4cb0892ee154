//! HTTP handlers: chunk streams and daemon status.

pub mod status;
pub mod stream;

use std::sync::Arc;
use std::time::Duration;

use chunkbridge_core::config::SubscriberConfig;
use chunkbridge_services::{ChunkRouter, SubscriberTable};

use stream::OriginPolicy;

#[derive(Clone)]
pub struct ApiState {
    pub router: ChunkRouter,
    pub subscribers: SubscriberTable,
    pub origin_policy: Arc<OriginPolicy>,
    /// Minimum spacing between two writes to one subscriber.
    pub min_send_interval: Duration,
    /// Shutdown broadcast sender. Stream loops subscribe to it.
    pub shutdown: tokio::sync::broadcast::Sender<()>,
}

impl ApiState {
    pub fn new(
        router: ChunkRouter,
        subscribers: SubscriberTable,
        config: &SubscriberConfig,
        shutdown: tokio::sync::broadcast::Sender<()>,
    ) -> Self {
        Self {
            router,
            subscribers,
            origin_policy: Arc::new(OriginPolicy::from_origins(&config.allowed_origins)),
            min_send_interval: config.min_send_interval(),
            shutdown,
        }
    }
}
