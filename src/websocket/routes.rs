use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handler::ws_handler;
use crate::groups::InMemoryGroupNotifier;
use crate::server::MultiplayerHub;

/// Shared state for the HTTP/WebSocket routes.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<MultiplayerHub>,
    pub notifier: Arc<InMemoryGroupNotifier>,
    /// Per-connection outbound buffer size.
    pub outbound_buffer: usize,
}

/// Build the HTTP router: the WebSocket endpoint plus health and status.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "live_rooms": state.hub.room_count(),
        "active_sessions": state.hub.session_count(),
    }))
}
