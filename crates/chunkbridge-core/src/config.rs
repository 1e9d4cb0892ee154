//! Configuration system for chunkbridge.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. explicit path (first command line argument of the daemon)
//!   2. $CHUNKBRIDGE_CONFIG
//!   3. $XDG_CONFIG_HOME/chunkbridge/config.toml
//!   4. ~/.config/chunkbridge/config.toml
//!
//! The `[routing]` section has no defaults. Without it, or with an empty
//! chunk list, the daemon refuses to start.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::reassembly::DEFAULT_MAX_DOCUMENT_BYTES;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub subscribers: SubscriberConfig,
    pub routing: RoutingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// TCP address the binary frame listener binds to.
    pub listen_addr: String,
    /// Bytes requested per socket read.
    pub read_buffer_bytes: usize,
    /// Reassembled documents waiting for the dispatcher.
    pub max_pending_documents: usize,
    /// Largest session payload reassembled; bigger sessions are discarded.
    pub max_document_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriberConfig {
    /// HTTP address serving the WebSocket endpoints and the status API.
    pub listen_addr: String,
    /// Origins allowed to open a stream. Empty = any origin.
    pub allowed_origins: Vec<String>,
    /// Minimum gap between two writes to one subscriber.
    pub min_send_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Chunk types served, one endpoint and one queue each.
    pub registered_chunks: Vec<String>,
    /// Queue capacity per chunk type.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// How long the dispatcher waits on a full queue before dropping.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

pub const DEFAULT_INGEST_ADDR: &str = "0.0.0.0:10005";
pub const DEFAULT_SUBSCRIBER_ADDR: &str = "0.0.0.0:8080";

fn default_queue_capacity() -> usize {
    100
}

fn default_send_timeout_ms() -> u64 {
    250
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_INGEST_ADDR.to_string(),
            read_buffer_bytes: 4096,
            max_pending_documents: 1024,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_SUBSCRIBER_ADDR.to_string(),
            allowed_origins: Vec::new(),
            min_send_interval_ms: 1,
        }
    }
}

impl RoutingConfig {
    pub fn new(registered_chunks: Vec<String>) -> Self {
        Self {
            registered_chunks,
            queue_capacity: default_queue_capacity(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl SubscriberConfig {
    pub fn min_send_interval(&self) -> Duration {
        Duration::from_millis(self.min_send_interval_ms)
    }
}

/// Chunk type names become URL path segments.
fn is_valid_chunk_type(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("chunkbridge")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("no chunk types registered in [routing]")]
    NoChunkTypes,
    #[error("chunk type {0:?} registered more than once")]
    DuplicateChunkType(String),
    #[error("invalid chunk type {0:?}: use ASCII letters, digits, '_', '-' or '.'")]
    InvalidChunkType(String),
    #[error("routing.queue_capacity must be at least 1")]
    ZeroQueueCapacity,
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl BridgeConfig {
    /// Load config: file → env vars, then validate.
    ///
    /// `explicit` takes precedence over the environment and XDG locations.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::file_path);
        let text = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
        let mut config: BridgeConfig =
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?;
        config.validate()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse and validate a config document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig =
            toml::from_str(text).map_err(|e| ConfigError::ParseFailed(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Config file path when none is given explicitly.
    pub fn file_path() -> PathBuf {
        std::env::var("CHUNKBRIDGE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let chunks = &self.routing.registered_chunks;
        if chunks.is_empty() {
            return Err(ConfigError::NoChunkTypes);
        }
        let mut seen = HashSet::new();
        for name in chunks {
            if !is_valid_chunk_type(name) {
                return Err(ConfigError::InvalidChunkType(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateChunkType(name.clone()));
            }
        }
        if self.routing.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }

    /// Apply CHUNKBRIDGE_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CHUNKBRIDGE_INGEST__LISTEN_ADDR") {
            self.ingest.listen_addr = v;
        }
        if let Ok(v) = std::env::var("CHUNKBRIDGE_SUBSCRIBERS__LISTEN_ADDR") {
            self.subscribers.listen_addr = v;
        }
    }
}
