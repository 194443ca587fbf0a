use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::interface::LanguageDetector;
use super::stage::DetectionStage;
use crate::models::{DetectionResponse, TranslationRequest};

#[derive(Debug, Deserialize)]
pub struct DetectionInput {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub target_lang: Option<String>,
}

pub fn create_routes(stage: Arc<DetectionStage>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health_check))
        .route("/detect-language", post(detect_language))
        .with_state(stage)
}

async fn root() -> Json<Value> {
    Json(json!({"message": "Welcome to the Language Detection Service!"}))
}

async fn health_check() -> Json<Value> {
    Json(json!({"status": "ok", "service": "language-detection"}))
}

async fn detect_language(
    State(stage): State<Arc<DetectionStage>>,
    Json(input): Json<DetectionInput>,
) -> (StatusCode, Json<DetectionResponse>) {
    let id = input.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let request = TranslationRequest::new(id, input.text, input.target_lang);

    let response = stage.detect_language(&request).await;
    let status = if response.is_success() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(response))
}
