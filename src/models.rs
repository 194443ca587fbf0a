use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, Result};

/// The unit of work threaded through the pipeline.
///
/// Stages never mutate a request they received; they derive an enriched copy
/// with the `with_*` / `into_*` methods and publish that instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_text: Option<String>,
}

impl TranslationRequest {
    pub fn new(id: impl Into<String>, text: impl Into<String>, target_lang: Option<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source_lang: None,
            target_lang,
            translation_text: None,
        }
    }

    pub fn with_source_lang(self, source_lang: impl Into<String>) -> Self {
        Self {
            source_lang: Some(source_lang.into()),
            ..self
        }
    }

    pub fn with_target_lang(self, target_lang: impl Into<String>) -> Self {
        Self {
            target_lang: Some(target_lang.into()),
            ..self
        }
    }

    /// Build the final result record. Both languages must be known by now.
    pub fn into_result(self, translation_text: impl Into<String>) -> Result<TranslationResult> {
        let source_lang = self.source_lang.ok_or_else(|| {
            PipelineError::InvalidRequest(format!("request {} has no source_lang", self.id))
        })?;
        let target_lang = self.target_lang.ok_or_else(|| {
            PipelineError::InvalidRequest(format!("request {} has no target_lang", self.id))
        })?;

        Ok(TranslationResult {
            id: self.id,
            text: self.text,
            translation_text: translation_text.into(),
            source_lang,
            target_lang,
        })
    }
}

/// Message published on the `translation` queue and returned to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub id: String,
    pub text: String,
    pub translation_text: String,
    pub source_lang: String,
    pub target_lang: String,
}

/// Progress event published on the `status` queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message_type: "status".to_string(),
            message: message.into(),
            id: None,
        }
    }

    pub fn for_request(id: &str, message: impl Into<String>) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::new(message)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionData {
    pub source_lang: String,
}

/// Reply of the detection stage's synchronous entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DetectionResponse {
    Success { data: DetectionData },
    Error { message: String },
}

impl DetectionResponse {
    pub fn success(source_lang: impl Into<String>) -> Self {
        DetectionResponse::Success {
            data: DetectionData {
                source_lang: source_lang.into(),
            },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        DetectionResponse::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DetectionResponse::Success { .. })
    }
}

/// Inbound WebSocket payload. Any `id` the client sends is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientMessage {
    pub text: String,
    #[serde(default)]
    pub target_lang: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detection_message_omits_missing_fields() {
        let request = TranslationRequest::new("abc", "Bonjour", Some("en".into()))
            .with_source_lang("fr");

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"id": "abc", "text": "Bonjour", "source_lang": "fr", "target_lang": "en"})
        );
    }

    #[test]
    fn enrichment_leaves_the_original_untouched() {
        let original = TranslationRequest::new("abc", "Hola", Some("en".into()));
        let enriched = original.clone().with_source_lang("es");

        assert_eq!(original.source_lang, None);
        assert_eq!(enriched.source_lang.as_deref(), Some("es"));
    }

    #[test]
    fn into_result_requires_both_languages() {
        let request = TranslationRequest::new("abc", "Hola", Some("en".into()));
        let err = request.into_result("Hello").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRequest(_)));
    }

    #[test]
    fn status_message_wire_shape() {
        let value = serde_json::to_value(StatusMessage::new("Translation started.")).unwrap();
        assert_eq!(value, json!({"type": "status", "message": "Translation started."}));

        let value = serde_json::to_value(StatusMessage::for_request("r1", "done")).unwrap();
        assert_eq!(value["id"], "r1");
    }

    #[test]
    fn detection_response_is_tagged_by_status() {
        let value = serde_json::to_value(DetectionResponse::success("fr")).unwrap();
        assert_eq!(value, json!({"status": "success", "data": {"source_lang": "fr"}}));

        let parsed: DetectionResponse =
            serde_json::from_value(json!({"status": "error", "message": "boom"})).unwrap();
        assert_eq!(parsed, DetectionResponse::error("boom"));
    }

    #[test]
    fn client_message_ignores_extra_fields() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"text":"Hi","target_lang":"fr","id":7,"room":"x"}"#).unwrap();
        assert_eq!(msg.text, "Hi");
        assert_eq!(msg.target_lang.as_deref(), Some("fr"));
    }
}
