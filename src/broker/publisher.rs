use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::interface::{Broker, BrokerError};
use crate::errors::Result;
use crate::models::StatusMessage;

/// Publishes JSON onto named queues. A closed channel triggers a reconnect
/// and another try; the total number of publish attempts is capped by
/// `max_attempts`.
#[derive(Clone)]
pub struct QueuePublisher {
    broker: Arc<dyn Broker>,
    max_attempts: u32,
}

impl QueuePublisher {
    pub fn new(broker: Arc<dyn Broker>, max_attempts: u32) -> Self {
        Self {
            broker,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn broker(&self) -> &Arc<dyn Broker> {
        &self.broker
    }

    pub async fn publish_json<T: Serialize>(&self, queue: &str, message: &T) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        self.publish_bytes(queue, &payload).await
    }

    pub async fn publish_bytes(&self, queue: &str, payload: &[u8]) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.broker.publish(queue, payload).await {
                Ok(()) => {
                    debug!("Message published to '{}'", queue);
                    return Ok(());
                }
                Err(BrokerError::ChannelClosed(reason)) if attempt < self.max_attempts => {
                    error!("Channel is closed: {}. Re-establishing connection...", reason);
                    if let Err(e) = self.broker.reconnect().await {
                        warn!("Reconnect attempt {} failed: {}", attempt, e);
                    }
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        "Failed to publish to '{}' after {} attempt(s): {}",
                        queue, attempt, e
                    );
                    return Err(e.into());
                }
            }
        }
    }

    /// Exactly one publish attempt, for callers that own the retry loop.
    ///
    /// A closed channel is re-established before the error is returned, so
    /// the caller's next attempt starts on a fresh channel.
    pub async fn publish_json_once<T: Serialize>(&self, queue: &str, message: &T) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        match self.broker.publish(queue, &payload).await {
            Ok(()) => {
                debug!("Message published to '{}'", queue);
                Ok(())
            }
            Err(e) => {
                error!("Failed to publish to '{}': {}", queue, e);
                if e.is_channel_closed() {
                    if let Err(reconnect) = self.broker.reconnect().await {
                        warn!("Reconnect failed: {}", reconnect);
                    }
                }
                Err(e.into())
            }
        }
    }

    /// Status events are best effort: a failure is logged, never raised.
    pub async fn publish_status(&self, queue: &str, status: StatusMessage) {
        info!("Publishing status: {}", status.message);
        if let Err(e) = self.publish_json(queue, &status).await {
            error!("Failed to publish status message: {}", e);
        }
    }
}
