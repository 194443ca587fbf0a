use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

use super::interface::TextIntelligence;
use crate::config::TextIntelligenceConfig;
use crate::errors::{PipelineError, Result};
use crate::languages::normalize_code;

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

fn detection_prompt() -> String {
    "You will be provided with user input in some language. Identify the language \
     and reply with its ISO 639-1 code only (for example en, fr), without any other text."
        .to_string()
}

fn translation_prompt(source_lang: &str, target_lang: &str) -> String {
    format!(
        "You will be provided with user input in language_code: {source_lang}. \
         Translate the text into language_code: {target_lang}. \
         Only output the translated text, without any additional text."
    )
}

/// Client for an OpenAI-compatible chat-completions endpoint
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiClient {
    pub fn new(config: &TextIntelligenceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        info!(
            "Initialized text intelligence client: model={}, base_url={}",
            config.model, config.base_url
        );

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.resolve_api_key(),
            model: config.model.clone(),
        })
    }

    async fn complete(&self, system: String, user: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: 0.0,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Chat completion failed: HTTP {}, body: {}", status, text);
            return Err(PipelineError::TextIntelligence(format!(
                "HTTP {status}: {text}"
            )));
        }

        let completion: ChatCompletion = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| PipelineError::TextIntelligence("empty completion".to_string()))
    }
}

#[async_trait]
impl TextIntelligence for OpenAiClient {
    async fn detect(&self, text: &str) -> Result<String> {
        debug!("Detecting language of {} chars", text.len());
        let reply = self.complete(detection_prompt(), text).await?;
        let code = normalize_code(&reply).ok_or_else(|| {
            PipelineError::TextIntelligence(format!("unrecognized language code: {reply:?}"))
        })?;
        info!("Language detected: {}", code);
        Ok(code)
    }

    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        info!("Translating text from {} to {}", source_lang, target_lang);
        let translation = self
            .complete(translation_prompt(source_lang, target_lang), text)
            .await?;
        debug!("Translation completed: {}", translation);
        Ok(translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_prompt_names_both_languages() {
        let prompt = translation_prompt("fr", "en");
        assert!(prompt.contains("language_code: fr"));
        assert!(prompt.contains("language_code: en"));
    }

    #[test]
    fn completion_parsing_takes_the_first_choice() {
        let completion: ChatCompletion = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":" Hello \n"}}]}"#,
        )
        .unwrap();
        assert_eq!(completion.choices[0].message.content.trim(), "Hello");
    }

    #[test]
    fn trailing_slash_is_stripped_from_base_url() {
        let config = TextIntelligenceConfig {
            base_url: "http://localhost:9999/v1/".to_string(),
            api_key: Some("k".to_string()),
            ..TextIntelligenceConfig::default()
        };
        let client = OpenAiClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:9999/v1");
        assert_eq!(client.api_key.as_deref(), Some("k"));
    }
}
