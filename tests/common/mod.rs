#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use translation_network::broker::{Broker, ConsumerSettings, MemoryBroker};
use translation_network::config::Config;
use translation_network::errors::{PipelineError, Result};
use translation_network::text_intelligence::TextIntelligence;

/// Text intelligence double with canned answers, injectable failures and
/// call counters.
#[derive(Default)]
pub struct ScriptedIntelligence {
    detections: HashMap<String, String>,
    translations: HashMap<(String, String), String>,
    detect_failures: Mutex<u32>,
    translate_failures: Mutex<u32>,
    detect_delay: Option<Duration>,
    pub detect_calls: AtomicU32,
    pub translate_calls: AtomicU32,
}

impl ScriptedIntelligence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detects(mut self, text: &str, lang: &str) -> Self {
        self.detections.insert(text.to_string(), lang.to_string());
        self
    }

    pub fn translates(mut self, text: &str, target: &str, output: &str) -> Self {
        self.translations
            .insert((text.to_string(), target.to_string()), output.to_string());
        self
    }

    /// Fail the next `n` detect calls
    pub fn failing_detect(self, n: u32) -> Self {
        *self.detect_failures.lock().unwrap() = n;
        self
    }

    /// Fail the next `n` translate calls
    pub fn failing_translate(self, n: u32) -> Self {
        *self.translate_failures.lock().unwrap() = n;
        self
    }

    pub fn slow_detect(mut self, delay: Duration) -> Self {
        self.detect_delay = Some(delay);
        self
    }

    pub fn detect_count(&self) -> u32 {
        self.detect_calls.load(Ordering::SeqCst)
    }

    pub fn translate_count(&self) -> u32 {
        self.translate_calls.load(Ordering::SeqCst)
    }

    fn take_failure(counter: &Mutex<u32>) -> bool {
        let mut remaining = counter.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl TextIntelligence for ScriptedIntelligence {
    async fn detect(&self, text: &str) -> Result<String> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.detect_delay {
            tokio::time::sleep(delay).await;
        }
        if Self::take_failure(&self.detect_failures) {
            return Err(PipelineError::TextIntelligence("detect unavailable".to_string()));
        }
        Ok(self
            .detections
            .get(text)
            .cloned()
            .unwrap_or_else(|| "en".to_string()))
    }

    async fn translate(&self, text: &str, _source_lang: &str, target_lang: &str) -> Result<String> {
        self.translate_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.translate_failures) {
            return Err(PipelineError::TextIntelligence("translate unavailable".to_string()));
        }
        self.translations
            .get(&(text.to_string(), target_lang.to_string()))
            .cloned()
            .ok_or_else(|| PipelineError::TextIntelligence(format!("no translation for {text}")))
    }
}

pub fn test_config() -> Config {
    let mut config = Config::from_yaml(
        r#"
broker:
  url: "memory://"
  poll_interval_ms: 20
  reconnect_delay_ms: 20
gateway:
  result_timeout_secs: 5
"#,
    )
    .unwrap();
    config.languages.supported = vec!["en".into(), "es".into(), "fr".into()];
    config
}

pub fn fast_consumers() -> ConsumerSettings {
    ConsumerSettings {
        poll_interval: Duration::from_millis(20),
        reconnect_delay: Duration::from_millis(20),
    }
}

pub fn memory_broker() -> (MemoryBroker, Arc<dyn Broker>) {
    let broker = MemoryBroker::with_publish_log();
    let shared: Arc<dyn Broker> = Arc::new(broker.clone());
    (broker, shared)
}
