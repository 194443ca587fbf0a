use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// The channel or its connection is gone; a reconnect may fix it
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("consume failed: {0}")]
    Consume(String),

    #[error("ack failed: {0}")]
    Ack(String),
}

impl BrokerError {
    pub fn is_channel_closed(&self) -> bool {
        matches!(self, BrokerError::ChannelClosed(_))
    }
}

/// A message taken from a queue, pending acknowledgement
#[derive(Debug, Clone)]
pub struct Delivery {
    pub tag: u64,
    pub payload: Vec<u8>,
    pub redelivered: bool,
}

/// Named-queue message broker shared by all stages.
///
/// Publishing goes through one long-lived channel owned by the implementation.
/// Every `consume` call opens a dedicated connection for the caller, so a
/// consume loop never shares its channel with another thread.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError>;

    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Drop the publishing channel and open a fresh one
    async fn reconnect(&self) -> Result<(), BrokerError>;

    async fn consume(&self, queue: &str) -> Result<Box<dyn QueueConsumer>, BrokerError>;
}

#[async_trait]
pub trait QueueConsumer: Send {
    /// Wait up to `wait` for the next delivery; `Ok(None)` when nothing arrived
    async fn next_delivery(&mut self, wait: Duration) -> Result<Option<Delivery>, BrokerError>;

    async fn ack(&mut self, delivery: &Delivery) -> Result<(), BrokerError>;

    async fn close(&mut self) -> Result<(), BrokerError>;
}
