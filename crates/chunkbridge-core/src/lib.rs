//! chunkbridge-core: wire format, session reassembly, chunk classification
//! and configuration. All other chunkbridge crates depend on this one.

pub mod config;
pub mod message;
pub mod reassembly;
pub mod wire;

pub use config::{BridgeConfig, ConfigError};
pub use message::{ChunkMessage, ClassifyError};
pub use reassembly::{Continuity, Reassembler, SessionState};
pub use wire::{Frame, SessionStates, WireError};
