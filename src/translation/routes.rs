use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

pub fn create_routes() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health_check))
}

async fn root() -> Json<Value> {
    Json(json!({"message": "Welcome to the Translation Service!"}))
}

async fn health_check() -> Json<Value> {
    Json(json!({"status": "ok", "service": "translation"}))
}
