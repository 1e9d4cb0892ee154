//! Per-connection frame reader.
//!
//! Owns the connection's read buffer and session reassembler. TCP segments
//! are appended to the buffer as they arrive; every complete frame is pushed
//! through the reassembler and finished documents go to the dispatcher.

use std::fmt;
use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{broadcast, mpsc};

use chunkbridge_core::wire::{decode_frame, FRAME_HEADER_SIZE};
use chunkbridge_core::{Reassembler, WireError};

/// Why a connection reader stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEnd {
    /// Peer closed the stream.
    Closed,
    Corrupt(WireError),
    ReadFailed(String),
    DispatcherGone,
    Shutdown,
}

impl fmt::Display for ConnectionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionEnd::Closed => write!(f, "closed by peer"),
            ConnectionEnd::Corrupt(e) => write!(f, "corrupt stream: {e}"),
            ConnectionEnd::ReadFailed(e) => write!(f, "read failed: {e}"),
            ConnectionEnd::DispatcherGone => write!(f, "dispatcher stopped"),
            ConnectionEnd::Shutdown => write!(f, "shutdown"),
        }
    }
}

pub struct ConnectionReader<S> {
    stream: S,
    peer: SocketAddr,
    documents: mpsc::Sender<Bytes>,
    read_buffer_bytes: usize,
    max_document_bytes: usize,
    shutdown: broadcast::Receiver<()>,
}

impl<S: AsyncRead + Unpin> ConnectionReader<S> {
    pub fn new(
        stream: S,
        peer: SocketAddr,
        documents: mpsc::Sender<Bytes>,
        read_buffer_bytes: usize,
        max_document_bytes: usize,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            stream,
            peer,
            documents,
            read_buffer_bytes: read_buffer_bytes.max(FRAME_HEADER_SIZE),
            max_document_bytes,
            shutdown,
        }
    }

    pub async fn run(mut self) -> ConnectionEnd {
        let mut buf = BytesMut::with_capacity(self.read_buffer_bytes);
        let mut reassembler = Reassembler::with_limit(self.max_document_bytes);

        loop {
            loop {
                let frame = match decode_frame(&mut buf) {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(e) => {
                        let shown = buf.len().min(FRAME_HEADER_SIZE);
                        tracing::error!(
                            peer = %self.peer,
                            error = %e,
                            header = %hex::encode(&buf[..shown]),
                            "undecodable frame, closing connection"
                        );
                        return ConnectionEnd::Corrupt(e);
                    }
                };

                if let Some(document) = reassembler.push(frame) {
                    tracing::debug!(peer = %self.peer, len = document.len(), "session reassembled");
                    if self.documents.send(document).await.is_err() {
                        return ConnectionEnd::DispatcherGone;
                    }
                }
            }

            buf.reserve(self.read_buffer_bytes);
            tokio::select! {
                _ = self.shutdown.recv() => return ConnectionEnd::Shutdown,

                read = self.stream.read_buf(&mut buf) => match read {
                    Ok(0) => {
                        if !buf.is_empty() || reassembler.pending() > 0 {
                            tracing::debug!(
                                peer = %self.peer,
                                unframed = buf.len(),
                                partial_session = reassembler.pending(),
                                "stream ended mid-session"
                            );
                        }
                        return ConnectionEnd::Closed;
                    }
                    Ok(_) => {}
                    Err(e) => return ConnectionEnd::ReadFailed(e.to_string()),
                },
            }
        }
    }
}
