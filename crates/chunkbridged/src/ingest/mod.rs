//! Binary frame ingestion: TCP listener and per-connection readers.

pub mod connection;
pub mod listener;

pub use connection::{ConnectionEnd, ConnectionReader};
pub use listener::IngestListener;
