use async_trait::async_trait;

use crate::errors::Result;

/// Language detection and translation capability. Implementations may be
/// slow or fail transiently; callers own the retry policy.
#[async_trait]
pub trait TextIntelligence: Send + Sync {
    /// Detect the language of `text`, returning a bare code such as `"fr"`
    async fn detect(&self, text: &str) -> Result<String>;

    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String>;
}
