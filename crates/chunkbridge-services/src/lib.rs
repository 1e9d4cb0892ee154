//! chunkbridge-services: the shared state between the ingest side and the
//! subscriber side of the bridge.

pub mod qos;
pub mod router;
pub mod subscriber;

pub use qos::SendGate;
pub use router::{ChunkRouter, ConsumerGuard, RouteError};
pub use subscriber::{DeliveryStats, SubscriberEntry, SubscriberHandle, SubscriberTable};
