//! chunkbridge integration test harness.
//!
//! Each test runs a complete bridge in-process on loopback, with both
//! listeners on ephemeral ports:
//!
//!   cargo test --test integration
//!
//! Producers are plain TCP streams writing encoded frames; subscribers are
//! tokio-tungstenite clients.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bytes::BytesMut;
use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use chunkbridge_core::wire::{encode_frame, TRANSMISSION_CONTINUING, TRANSMISSION_LAST};
use chunkbridge_core::{BridgeConfig, SessionStates};
use chunkbridge_services::{ChunkRouter, SubscriberTable};
use chunkbridged::Daemon;

mod pipeline;
mod routing;

// ── Harness ───────────────────────────────────────────────────────────────────

pub type Subscriber = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a test waits for something that should happen.
pub const WAIT: Duration = Duration::from_secs(3);

/// A running bridge. Shuts down when dropped.
pub struct TestBridge {
    pub ingest: SocketAddr,
    pub http: SocketAddr,
    pub router: ChunkRouter,
    pub subscribers: SubscriberTable,
    shutdown: broadcast::Sender<()>,
}

impl Drop for TestBridge {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
    }
}

/// Start a bridge routing `chunks`. `tweak` may adjust the config further.
pub async fn start_bridge(chunks: &[&str], tweak: impl FnOnce(&mut BridgeConfig)) -> TestBridge {
    let list = chunks
        .iter()
        .map(|c| format!("{c:?}"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut config = BridgeConfig::from_toml(&format!("[routing]\nregistered_chunks = [{list}]\n"))
        .expect("test config must be valid");
    config.ingest.listen_addr = "127.0.0.1:0".to_string();
    config.subscribers.listen_addr = "127.0.0.1:0".to_string();
    tweak(&mut config);

    let daemon = Daemon::bind(config).await.expect("bind failed");
    let bridge = TestBridge {
        ingest: daemon.ingest_addr().unwrap(),
        http: daemon.subscriber_addr().unwrap(),
        router: daemon.router().clone(),
        subscribers: daemon.subscribers().clone(),
        shutdown: daemon.shutdown_handle(),
    };
    tokio::spawn(daemon.run());
    bridge
}

/// Encode one session: `pieces` become consecutive frames, the last one
/// marked last-in-sequence.
pub fn session(session_number: u32, pieces: &[&[u8]]) -> BytesMut {
    let mut out = BytesMut::new();
    for (i, piece) in pieces.iter().enumerate() {
        let state = if i + 1 == pieces.len() {
            TRANSMISSION_LAST
        } else {
            TRANSMISSION_CONTINUING
        };
        let states = SessionStates::new(state, session_number, i as u32);
        encode_frame(&states, piece, &mut out).expect("frame too large");
    }
    out
}

pub async fn producer(bridge: &TestBridge) -> TcpStream {
    TcpStream::connect(bridge.ingest)
        .await
        .expect("ingest connect failed")
}

/// Write `bytes` in pieces of `step` bytes, yielding between writes.
pub async fn dribble(stream: &mut TcpStream, bytes: &[u8], step: usize) {
    for piece in bytes.chunks(step) {
        stream.write_all(piece).await.expect("write failed");
        stream.flush().await.expect("flush failed");
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

pub fn stream_url(bridge: &TestBridge, chunk_type: &str) -> String {
    format!("ws://{}/DataTypes/{chunk_type}", bridge.http)
}

pub async fn subscribe(bridge: &TestBridge, chunk_type: &str) -> Subscriber {
    let (ws, _) = tokio_tungstenite::connect_async(stream_url(bridge, chunk_type))
        .await
        .expect("subscribe failed");
    ws
}

/// Open a stream with an `Origin` header. Returns the HTTP status of a
/// refused upgrade as the error.
pub async fn subscribe_from(
    bridge: &TestBridge,
    chunk_type: &str,
    origin: &'static str,
) -> std::result::Result<Subscriber, u16> {
    let mut request = stream_url(bridge, chunk_type)
        .into_client_request()
        .expect("bad request");
    request
        .headers_mut()
        .insert("Origin", HeaderValue::from_static(origin));
    connect(request).await
}

pub async fn connect<R: IntoClientRequest + Unpin>(
    request: R,
) -> std::result::Result<Subscriber, u16> {
    match tokio_tungstenite::connect_async(request).await {
        Ok((ws, _)) => Ok(ws),
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            Err(response.status().as_u16())
        }
        Err(e) => panic!("unexpected connect error: {e}"),
    }
}

/// Next text frame, or `None` if nothing arrives within `within`.
pub async fn next_text(ws: &mut Subscriber, within: Duration) -> Option<String> {
    loop {
        let message = tokio::time::timeout(within, ws.next()).await.ok()??.ok()?;
        match message {
            Message::Text(text) => return Some(text.as_str().to_owned()),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
}

/// Minimal HTTP/1.1 GET. Returns the status code and body.
pub async fn http_get(addr: SocketAddr, path: &str) -> Result<(u16, String)> {
    let mut stream = TcpStream::connect(addr).await?;
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;

    let mut raw = Vec::new();
    tokio::time::timeout(WAIT, stream.read_to_end(&mut raw))
        .await
        .context("http response timed out")??;
    let text = String::from_utf8(raw)?;

    let (head, body) = text
        .split_once("\r\n\r\n")
        .context("malformed http response")?;
    let status = head
        .split_whitespace()
        .nth(1)
        .context("missing status code")?
        .parse()?;
    Ok((status, body.to_string()))
}

pub async fn status_json(bridge: &TestBridge) -> Result<serde_json::Value> {
    let (code, body) = http_get(bridge.http, "/api/status").await?;
    if code != 200 {
        bail!("status endpoint returned {code}: {body}");
    }
    Ok(serde_json::from_str(&body)?)
}

/// Poll `cond` until it holds or `WAIT` runs out.
pub async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}
