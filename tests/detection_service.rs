mod common;

use axum::body::Body;
use axum::routing::post;
use axum::Router;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use common::{memory_broker, test_config, ScriptedIntelligence};
use translation_network::detection::routes::create_routes;
use translation_network::detection::{DetectionHttpClient, DetectionStage, LanguageDetector};
use translation_network::models::{DetectionResponse, TranslationRequest};

fn stage(ti: ScriptedIntelligence) -> Arc<DetectionStage> {
    let (_broker, shared) = memory_broker();
    Arc::new(DetectionStage::from_config(&test_config(), shared, Arc::new(ti)))
}

async fn post_detect(stage: Arc<DetectionStage>, body: Value) -> (StatusCode, Value) {
    let response = create_routes(stage)
        .oneshot(
            Request::post("/detect-language")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn detect_language_endpoint_returns_the_code() {
    let stage = stage(ScriptedIntelligence::new().detects("Bonjour", "fr"));

    let (status, body) = post_detect(stage, json!({"text": "Bonjour", "target_lang": "en"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "success", "data": {"source_lang": "fr"}}));
}

#[tokio::test]
async fn detect_language_endpoint_reports_exhaustion() {
    let stage = stage(ScriptedIntelligence::new().failing_detect(10));

    let (status, body) = post_detect(stage, json!({"id": "abc", "text": "Bonjour"})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn http_client_talks_to_a_running_detection_service() {
    let stage = stage(ScriptedIntelligence::new().detects("Hola", "es"));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(listener, create_routes(stage)).await.unwrap();
    });

    let client =
        DetectionHttpClient::new(format!("http://{addr}/detect-language"), Duration::from_secs(5))
            .unwrap();
    let response = client
        .detect_language(&TranslationRequest::new("r-1", "Hola", Some("en".to_string())))
        .await;

    assert_eq!(response, DetectionResponse::success("es"));
    server.abort();
}

#[tokio::test]
async fn http_client_maps_an_unreachable_service_to_an_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client =
        DetectionHttpClient::new(format!("http://{addr}/detect-language"), Duration::from_secs(5))
            .unwrap();
    let response = client
        .detect_language(&TranslationRequest::new("r-2", "Hola", None))
        .await;

    assert!(!response.is_success());
}

#[tokio::test]
async fn http_client_gives_up_on_a_stalled_service() {
    let stalled = Router::new().route(
        "/detect-language",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            "too late"
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(listener, stalled).await.unwrap();
    });

    let client = DetectionHttpClient::new(
        format!("http://{addr}/detect-language"),
        Duration::from_millis(200),
    )
    .unwrap();
    let response = tokio::time::timeout(
        Duration::from_secs(5),
        client.detect_language(&TranslationRequest::new("r-3", "Hola", None)),
    )
    .await
    .expect("client should time out on its own");

    assert!(!response.is_success());
    server.abort();
}
