use thiserror::Error;

use crate::broker::BrokerError;

/// Errors raised while moving a request through the pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("text intelligence error: {0}")]
    TextIntelligence(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("detection failed: {0}")]
    Detection(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("shutdown in progress")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, PipelineError>;
