//! chunkbridged: binary frame ingestion, routing dispatch and process wiring.

pub mod daemon;
pub mod dispatch;
pub mod ingest;

pub use daemon::Daemon;
pub use dispatch::{ChunkDispatcher, DispatchOutcome};
