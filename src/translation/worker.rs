use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::broker::{Broker, DeliveryHandler, QueuePublisher};
use crate::config::{Config, QueueNames};
use crate::errors::{PipelineError, Result};
use crate::languages::Languages;
use crate::models::{StatusMessage, TranslationRequest, TranslationResult};
use crate::retry::RetryPolicy;
use crate::text_intelligence::TextIntelligence;

pub const TRANSLATION_STARTED: &str = "Translation started.";
pub const TRANSLATION_COMPLETED: &str = "Translation completed.";
pub const TRANSLATION_FAILED: &str = "Translation failed.";

/// Consumes detected requests, translates them and publishes the result on
/// the `translation` queue.
pub struct TranslationWorker {
    text_intelligence: Arc<dyn TextIntelligence>,
    publisher: QueuePublisher,
    queues: QueueNames,
    languages: Languages,
    retry: RetryPolicy,
}

impl TranslationWorker {
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

    /// Translate unless both languages match, in which case the text is
    /// returned as is without calling out.
    pub async fn translate_text(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        if source_lang == target_lang {
            info!("Source and target languages are the same. Returning original text.");
            return Ok(text.to_string());
        }
        self.text_intelligence
            .translate(text, source_lang, target_lang)
            .await
    }

    /// Process one detected request end to end.
    ///
    /// After the retry budget is spent a failure status goes out and the
    /// error is returned; the caller still acknowledges the message.
    pub async fn process(&self, request: TranslationRequest) -> Result<TranslationResult> {
        let request = self.fill_languages(request);
        let source_lang = request.source_lang.clone().unwrap_or_default();
        let target_lang = request.target_lang.clone().unwrap_or_default();

        self.publish_status(&request.id, TRANSLATION_STARTED).await;

        let pending = &request;
        let (source, target) = (source_lang.as_str(), target_lang.as_str());
        let translated = self
            .retry
            .run("translation", move |_| {
                self.translate_text(&pending.text, source, target)
            })
            .await;

        let translated = match translated {
            Ok(text) => text,
            Err(e) => {
                self.publish_status(&request.id, TRANSLATION_FAILED).await;
                return Err(e);
            }
        };
        info!("Translation result for {}: {}", request.id, translated);

        let result = request.into_result(translated)?;
        if let Err(e) = self
            .publisher
            .publish_json(&self.queues.translation, &result)
            .await
        {
            error!("Error publishing translation result {}: {}", result.id, e);
            self.publish_status(&result.id, TRANSLATION_FAILED).await;
            return Err(e);
        }
        info!("Translation result {} published", result.id);

        self.publish_status(&result.id, TRANSLATION_COMPLETED).await;
        Ok(result)
    }

    fn fill_languages(&self, request: TranslationRequest) -> TranslationRequest {
        let request = match request.source_lang {
            Some(_) => request,
            None => request.with_source_lang(self.languages.default_source()),
        };
        match request.target_lang {
            Some(_) => request,
            None => request.with_target_lang(self.languages.default_target()),
        }
    }

    async fn publish_status(&self, id: &str, message: &str) {
        self.publisher
            .publish_status(&self.queues.status, StatusMessage::for_request(id, message))
            .await;
    }
}

#[async_trait]
impl DeliveryHandler for TranslationWorker {
    async fn handle(&mut self, payload: &[u8]) -> Result<()> {
        let request: TranslationRequest = serde_json::from_slice(payload).map_err(|e| {
            PipelineError::InvalidRequest(format!("undecodable detection message: {e}"))
        })?;
        debug!("Processing message: {:?}", request);

        self.process(request).await.map(|_| ())
    }
}
