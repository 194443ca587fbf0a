use regex::Regex;
use std::sync::OnceLock;

use crate::config::LanguagesConfig;
use crate::errors::{PipelineError, Result};

fn code_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\b([A-Za-z]{2,3})(?:[-_][A-Za-z]{2,4})?\b").ok())
        .as_ref()
}

/// Reduce a model reply such as `"FR"`, `"en-US"` or `"es."` to a bare code.
///
/// Chatty replies put the code last ("The language is fr"), so the last
/// code-shaped token wins.
pub fn normalize_code(raw: &str) -> Option<String> {
    code_pattern()?
        .captures_iter(raw.trim())
        .filter_map(|caps| caps.get(1))
        .last()
        .map(|m| m.as_str().to_lowercase())
}

/// Supported-language set with the configured defaults
#[derive(Debug, Clone)]
pub struct Languages {
    supported: Vec<String>,
    default_source: String,
    default_target: String,
}

impl Languages {
    pub fn new(config: &LanguagesConfig) -> Self {
        Self {
            supported: config.supported.clone(),
            default_source: config.default_source.clone(),
            default_target: config.default_target.clone(),
        }
    }

    pub fn is_supported(&self, code: &str) -> bool {
        self.supported.iter().any(|s| s.eq_ignore_ascii_case(code))
    }

    pub fn default_source(&self) -> &str {
        &self.default_source
    }

    pub fn default_target(&self) -> &str {
        &self.default_target
    }

    /// Validate a client-supplied target, falling back to the default target.
    pub fn resolve_target(&self, requested: Option<&str>) -> Result<String> {
        let target = match requested.map(str::trim).filter(|s| !s.is_empty()) {
            Some(code) => code.to_lowercase(),
            None => self.default_target.clone(),
        };

        if self.is_supported(&target) {
            Ok(target)
        } else {
            Err(PipelineError::UnsupportedLanguage(target))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_model_replies() {
        assert_eq!(normalize_code("fr").as_deref(), Some("fr"));
        assert_eq!(normalize_code(" EN\n").as_deref(), Some("en"));
        assert_eq!(normalize_code("en-US").as_deref(), Some("en"));
        assert_eq!(normalize_code("es.").as_deref(), Some("es"));
        assert_eq!(normalize_code("").as_deref(), None);
        assert_eq!(normalize_code("???").as_deref(), None);
    }

    #[test]
    fn chatty_replies_use_the_trailing_code() {
        assert_eq!(normalize_code("The language is fr").as_deref(), Some("fr"));
        assert_eq!(normalize_code("Language code: es.").as_deref(), Some("es"));
        assert_eq!(normalize_code("It is pt-BR").as_deref(), Some("pt"));
    }

    #[test]
    fn resolve_target_validates_against_supported_set() {
        let languages = Languages::new(&LanguagesConfig::default());

        assert_eq!(languages.resolve_target(Some("FR")).unwrap(), "fr");
        assert_eq!(languages.resolve_target(None).unwrap(), "es");
        assert_eq!(languages.resolve_target(Some("  ")).unwrap(), "es");
        assert!(matches!(
            languages.resolve_target(Some("de")),
            Err(PipelineError::UnsupportedLanguage(code)) if code == "de"
        ));
    }
}
