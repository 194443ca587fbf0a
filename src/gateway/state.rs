use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use super::handoff::{BackgroundConsumers, JsonHandoff};
use super::router::ResultRouter;
use super::status::StatusBuffer;
use crate::broker::{Broker, ConsumerSettings, ConsumerWorker};
use crate::config::Config;
use crate::detection::LanguageDetector;
use crate::errors::{PipelineError, Result};
use crate::languages::Languages;
use crate::models::{ClientMessage, StatusMessage, TranslationRequest, TranslationResult};
use crate::shutdown::{Shutdown, StopFlag};

/// Everything a gateway connection or route needs, built once at startup
#[derive(Clone)]
pub struct GatewayState {
    pub languages: Languages,
    pub result_timeout: Duration,
    pub detector: Arc<dyn LanguageDetector>,
    pub results: Arc<ResultRouter>,
    pub status: Arc<StatusBuffer>,
    pub shutdown: Shutdown,
}

impl GatewayState {
    /// Start the `translation` and `status` consumer threads and the result
    /// dispatcher. Must be called from within a tokio runtime.
    pub fn start(
        config: &Config,
        broker: Arc<dyn Broker>,
        detector: Arc<dyn LanguageDetector>,
        shutdown: Shutdown,
        settings: ConsumerSettings,
    ) -> anyhow::Result<(Self, BackgroundConsumers)> {
        info!("Starting background tasks...");
        let stop = StopFlag::new();

        let (result_tx, result_rx) = mpsc::unbounded_channel::<TranslationResult>();
        let (status_tx, status_rx) = mpsc::unbounded_channel::<StatusMessage>();

        let status_worker = ConsumerWorker::spawn(
            broker.clone(),
            &config.queues.status,
            JsonHandoff::new("status", status_tx),
            stop.clone(),
            settings,
        )?;
        let translation_worker = match ConsumerWorker::spawn(
            broker,
            &config.queues.translation,
            JsonHandoff::new("translation", result_tx),
            stop.clone(),
            settings,
        ) {
            Ok(worker) => worker,
            Err(e) => {
                BackgroundConsumers::new(stop, vec![status_worker]).stop_and_join();
                return Err(e.into());
            }
        };

        let results = Arc::new(ResultRouter::new());
        results.spawn_dispatcher(result_rx);

        let state = Self {
            languages: Languages::new(&config.languages),
            result_timeout: config.gateway.result_timeout(),
            detector,
            results,
            status: Arc::new(StatusBuffer::new(status_rx)),
            shutdown,
        };
        info!("Background tasks started successfully");

        Ok((
            state,
            BackgroundConsumers::new(stop, vec![status_worker, translation_worker]),
        ))
    }

    /// Decode and validate a client frame into a fresh request with its own
    /// correlation id. Any id supplied by the client is discarded.
    pub fn prepare_request(&self, frame: &str) -> Result<TranslationRequest> {
        let message: ClientMessage = serde_json::from_str(frame)
            .map_err(|e| PipelineError::InvalidRequest(format!("malformed message: {e}")))?;

        if message.text.trim().is_empty() {
            return Err(PipelineError::InvalidRequest(
                "text must not be empty".to_string(),
            ));
        }
        let target_lang = self
            .languages
            .resolve_target(message.target_lang.as_deref())?;

        Ok(TranslationRequest::new(
            Uuid::new_v4().to_string(),
            message.text,
            Some(target_lang),
        ))
    }
}
