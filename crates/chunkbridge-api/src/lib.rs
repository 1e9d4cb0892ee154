pub mod delivery;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use delivery::{DeliveryEnd, DeliveryLoop};
pub use handlers::stream::OriginPolicy;
pub use handlers::ApiState;

/// Build the subscriber-facing router.
///
/// Each registered chunk type gets its own `/DataTypes/<type>` stream route;
/// any other path falls through to 404.
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new().route("/api/status", get(handlers::status::handle_status));

    for name in state.router.registered() {
        let chunk_type: Arc<str> = Arc::from(name.as_str());
        tracing::debug!(chunk_type = %chunk_type, "adding stream route");
        app = app.route(
            &format!("/DataTypes/{name}"),
            get(
                move |ws: WebSocketUpgrade,
                      ConnectInfo(peer): ConnectInfo<SocketAddr>,
                      headers: HeaderMap,
                      State(state): State<ApiState>| {
                    handlers::stream::handle_stream(ws, chunk_type.clone(), peer, headers, state)
                },
            ),
        );
    }

    app.with_state(state).layer(cors)
}

/// Serve subscribers on `listener` until the shutdown broadcast fires.
pub async fn serve(state: ApiState, listener: TcpListener) -> anyhow::Result<()> {
    let mut shutdown = state.shutdown.subscribe();
    let addr = listener.local_addr()?;
    let app = build_router(state);

    tracing::info!(%addr, "subscriber endpoint listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = shutdown.recv().await;
    })
    .await?;
    tracing::info!("subscriber endpoint stopped");
    Ok(())
}
