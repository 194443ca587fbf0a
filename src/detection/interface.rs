use async_trait::async_trait;

use crate::models::{DetectionResponse, TranslationRequest};

/// Synchronous entry point of the detection stage, as seen by the gateway.
///
/// Implemented in-process by `DetectionStage` and remotely by
/// `DetectionHttpClient`.
#[async_trait]
pub trait LanguageDetector: Send + Sync {
    async fn detect_language(&self, request: &TranslationRequest) -> DetectionResponse;
}
