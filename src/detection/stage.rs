use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

use super::interface::LanguageDetector;
use crate::broker::{Broker, QueuePublisher};
use crate::config::{Config, QueueNames};
use crate::errors::Result;
use crate::languages::Languages;
use crate::models::{DetectionResponse, StatusMessage, TranslationRequest};
use crate::retry::RetryPolicy;
use crate::text_intelligence::TextIntelligence;

pub const DETECTION_STARTED: &str = "Language detection started.";
pub const DETECTION_COMPLETED: &str = "Language detection completed.";
pub const DETECTION_FAILED: &str = "Language detection failed.";

/// Detects the source language of a request and hands the enriched request
/// to the translation stage via the `detection` queue.
pub struct DetectionStage {
    text_intelligence: Arc<dyn TextIntelligence>,
    publisher: QueuePublisher,
    queues: QueueNames,
    languages: Languages,
    retry: RetryPolicy,
}

impl DetectionStage {
    pub fn new(
        text_intelligence: Arc<dyn TextIntelligence>,
        publisher: QueuePublisher,
        queues: QueueNames,
        languages: Languages,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            text_intelligence,
            publisher,
            queues,
            languages,
            retry,
        }
    }

    pub fn from_config(
        config: &Config,
        broker: Arc<dyn Broker>,
        text_intelligence: Arc<dyn TextIntelligence>,
    ) -> Self {
        Self::new(
            text_intelligence,
            QueuePublisher::new(broker, config.retry.max_attempts),
            config.queues.clone(),
            Languages::new(&config.languages),
            RetryPolicy::from_config(&config.retry),
        )
    }

    /// Detect, publish to `detection`, and return the enriched copy.
    ///
    /// Emits "started" once, when the first detect call succeeds, then
    /// "completed" on success. An exhausted run where detection never
    /// succeeded emits only "failed".
    pub async fn process(&self, request: &TranslationRequest) -> Result<TranslationRequest> {
        info!("Starting language detection process for {}", request.id);
        let request = match request.target_lang {
            Some(_) => request.clone(),
            None => request.clone().with_target_lang(self.languages.default_target()),
        };

        let pending = &request;
        let started = &AtomicBool::new(false);
        let outcome = self
            .retry
            .run("language detection", move |attempt| {
                self.attempt(pending, started, attempt)
            })
            .await;

        match outcome {
            Ok(enriched) => {
                self.publish_status(&request.id, DETECTION_COMPLETED).await;
                Ok(enriched)
            }
            Err(e) => {
                error!("Language detection failed for {}: {}", request.id, e);
                self.publish_status(&request.id, DETECTION_FAILED).await;
                Err(e)
            }
        }
    }

    async fn attempt(
        &self,
        request: &TranslationRequest,
        started: &AtomicBool,
        attempt: u32,
    ) -> Result<TranslationRequest> {
        info!("Attempt {} for detection of {}", attempt, request.id);
        let source_lang = self.text_intelligence.detect(&request.text).await?;
        let enriched = request.clone().with_source_lang(source_lang);

        if !started.swap(true, Ordering::SeqCst) {
            self.publish_status(&request.id, DETECTION_STARTED).await;
        }

        // Single publish per attempt; the retry policy is the only ceiling.
        self.publisher
            .publish_json_once(&self.queues.detection, &enriched)
            .await?;
        info!("Request {} published to detection queue", enriched.id);
        Ok(enriched)
    }

    async fn publish_status(&self, id: &str, message: &str) {
        self.publisher
            .publish_status(&self.queues.status, StatusMessage::for_request(id, message))
            .await;
    }
}

#[async_trait]
impl LanguageDetector for DetectionStage {
    async fn detect_language(&self, request: &TranslationRequest) -> DetectionResponse {
        match self.process(request).await {
            Ok(enriched) => match enriched.source_lang {
                Some(source_lang) => DetectionResponse::success(source_lang),
                None => DetectionResponse::error("no source language detected"),
            },
            Err(e) => DetectionResponse::error(e.to_string()),
        }
    }
}
