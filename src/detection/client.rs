use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, info};

use super::interface::LanguageDetector;
use crate::errors::Result;
use crate::models::{DetectionResponse, TranslationRequest};

/// Calls a remote detection stage over HTTP (`POST /detect-language`)
#[derive(Debug, Clone)]
pub struct DetectionHttpClient {
    client: Client,
    url: String,
}

impl DetectionHttpClient {
    /// `timeout` bounds each call, including a stalled connect or body.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl LanguageDetector for DetectionHttpClient {
    async fn detect_language(&self, request: &TranslationRequest) -> DetectionResponse {
        info!("Starting language detection for {}", request.id);
        debug!("Calling detection service at {}", self.url);

        let response = match self.client.post(&self.url).json(request).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Error in language detection: {}", e);
                return DetectionResponse::error(e.to_string());
            }
        };

        let status = response.status();
        match response.json::<DetectionResponse>().await {
            Ok(body) => {
                debug!("Detection service replied {}: {:?}", status, body);
                body
            }
            Err(e) => {
                error!("Failed to call detection service. Status code: {}: {}", status, e);
                DetectionResponse::error("External service call failed")
            }
        }
    }
}
