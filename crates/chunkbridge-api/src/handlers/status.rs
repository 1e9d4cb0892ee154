//! GET /api/status

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::ApiState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub chunk_types: Vec<ChunkTypeInfo>,
    pub subscribers: Vec<SubscriberInfo>,
}

#[derive(Debug, Serialize)]
pub struct ChunkTypeInfo {
    pub name: String,
    pub queued: usize,
    pub capacity: usize,
    pub subscribers: usize,
}

#[derive(Debug, Serialize)]
pub struct SubscriberInfo {
    pub id: u64,
    pub chunk_type: String,
    pub peer: String,
    pub connected_secs: u64,
    pub sent: u64,
    pub dropped: u64,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let chunk_types = state
        .router
        .registered()
        .iter()
        .map(|name| ChunkTypeInfo {
            name: name.clone(),
            queued: state.router.queued(name).unwrap_or(0),
            capacity: state.router.capacity(),
            subscribers: state.subscribers.count(name),
        })
        .collect();

    let subscribers = state
        .subscribers
        .snapshot()
        .into_iter()
        .map(|e| SubscriberInfo {
            id: e.id,
            chunk_type: e.chunk_type,
            peer: e.peer_addr.to_string(),
            connected_secs: e.connected_at.elapsed().as_secs(),
            sent: e.stats.sent(),
            dropped: e.stats.dropped(),
        })
        .collect();

    Json(StatusResponse {
        chunk_types,
        subscribers,
    })
}
