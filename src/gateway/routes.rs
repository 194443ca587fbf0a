use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use super::state::GatewayState;
use super::status::StatusReply;
use super::websocket::websocket_handler;

pub fn create_routes(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(root))
        // WebSocket
        .route("/ws/chat/:room_id", get(websocket_handler))
        .route("/status", get(get_status))
        .route("/api/health", get(health_check))
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({"message": "Real-Time Translation Network API"}))
}

/// Pops at most one buffered status message; never waits.
async fn get_status(State(state): State<GatewayState>) -> Json<StatusReply> {
    Json(state.status.next_reply())
}

async fn health_check(State(state): State<GatewayState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "gateway",
        "pending_results": state.results.pending_count()
    }))
}
