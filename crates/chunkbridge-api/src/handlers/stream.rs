//! GET /DataTypes/<type>: upgrade to a WebSocket and stream one chunk type.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocket;
use axum::extract::WebSocketUpgrade;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;

use chunkbridge_services::SendGate;

use super::ApiState;
use crate::delivery::DeliveryLoop;

/// Which browser origins may open a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPolicy {
    AllowAll,
    /// Lowercased origins.
    AllowList(Vec<String>),
}

impl OriginPolicy {
    /// An empty list allows every origin.
    pub fn from_origins(origins: &[String]) -> Self {
        if origins.is_empty() {
            return OriginPolicy::AllowAll;
        }
        OriginPolicy::AllowList(
            origins
                .iter()
                .map(|o| o.trim().trim_end_matches('/').to_ascii_lowercase())
                .collect(),
        )
    }

    /// Requests without an `Origin` header come from non-browser clients and
    /// are always allowed.
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match (self, origin) {
            (OriginPolicy::AllowAll, _) | (_, None) => true,
            (OriginPolicy::AllowList(list), Some(origin)) => {
                let origin = origin.trim().trim_end_matches('/').to_ascii_lowercase();
                list.iter().any(|o| *o == origin)
            }
        }
    }
}

pub async fn handle_stream(
    ws: WebSocketUpgrade,
    chunk_type: Arc<str>,
    peer: SocketAddr,
    headers: HeaderMap,
    state: ApiState,
) -> Response {
    let origin = headers
        .get(header::ORIGIN)
        .map(|v| v.to_str().unwrap_or_default());
    if !state.origin_policy.allows(origin) {
        tracing::warn!(
            %peer,
            chunk_type = %chunk_type,
            origin = ?origin,
            "rejecting subscriber from disallowed origin"
        );
        return StatusCode::FORBIDDEN.into_response();
    }

    ws.on_upgrade(move |socket| run_subscriber(socket, chunk_type, peer, state))
        .into_response()
}

async fn run_subscriber(socket: WebSocket, chunk_type: Arc<str>, peer: SocketAddr, state: ApiState) {
    let handle = state.subscribers.register(&chunk_type, peer);
    tracing::info!(
        subscriber = handle.id(),
        %peer,
        chunk_type = %chunk_type,
        "subscriber connected"
    );

    let (sink, stream) = socket.split();
    let delivery = DeliveryLoop::new(
        state.router.clone(),
        chunk_type.clone(),
        SendGate::new(state.min_send_interval),
        handle.stats().clone(),
    );
    let end = delivery.run(sink, stream, state.shutdown.subscribe()).await;

    tracing::info!(
        subscriber = handle.id(),
        %peer,
        chunk_type = %chunk_type,
        reason = %end,
        sent = handle.stats().sent(),
        dropped = handle.stats().dropped(),
        "subscriber disconnected"
    );
}
