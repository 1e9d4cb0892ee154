//! Chunk messages: reassembled JSON documents classified by their root key.
//!
//! A chunk message names its type with its one and only root key:
//!
//! ```json
//! {"TimeChunk": {"v": 1}}
//! ```
//!
//! The document text is kept verbatim and is what subscribers see.

use serde_json::{Map, Value};

/// A classified JSON document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMessage {
    /// Root key of the document.
    pub chunk_type: String,
    /// The document exactly as it arrived.
    pub json: String,
}

impl ChunkMessage {
    /// Parse and classify a reassembled session payload.
    pub fn parse(bytes: &[u8]) -> Result<Self, ClassifyError> {
        let text =
            std::str::from_utf8(bytes).map_err(|e| ClassifyError::InvalidUtf8(e.to_string()))?;
        let value: Value =
            serde_json::from_str(text).map_err(|e| ClassifyError::InvalidJson(e.to_string()))?;

        let root = match value {
            Value::Object(map) => map,
            other => return Err(ClassifyError::NotAnObject(json_kind(&other))),
        };

        let chunk_type = single_root_key(&root)?;

        Ok(Self {
            chunk_type,
            json: text.to_owned(),
        })
    }

    pub fn len(&self) -> usize {
        self.json.len()
    }

    pub fn is_empty(&self) -> bool {
        self.json.is_empty()
    }
}

fn single_root_key(root: &Map<String, Value>) -> Result<String, ClassifyError> {
    let mut keys = root.keys();
    match (keys.next(), keys.next()) {
        (Some(key), None) => Ok(key.clone()),
        (None, _) => Err(ClassifyError::NoRootKey),
        (Some(_), Some(_)) => Err(ClassifyError::AmbiguousRootKey(
            root.keys().cloned().collect(),
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// Why a reassembled payload could not be classified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("document root is a {0}, expected an object")]
    NotAnObject(&'static str),

    #[error("document has no root key")]
    NoRootKey,

    #[error("document has several root keys: {0:?}")]
    AmbiguousRootKey(Vec<String>),
}
