use std::sync::Arc;
use anyhow::Result;
use tracing::info;

use super::amqp::AmqpBroker;
use super::interface::Broker;
use super::memory::MemoryBroker;
use crate::config::{BrokerConfig, QueueNames};

/// Factory for creating the broker a process talks to
pub struct BrokerFactory;

impl BrokerFactory {
    /// Connect the configured broker for a single role and declare the
    /// pipeline queues. `memory://` is rejected: a broker private to one
    /// process can never reach the other roles.
    pub async fn create(config: &BrokerConfig, queues: &QueueNames) -> Result<Arc<dyn Broker>> {
        Self::build(config, queues, false).await
    }

    /// Like `create`, but also accepts `memory://` since every role shares
    /// this process.
    pub async fn create_in_process(
        config: &BrokerConfig,
        queues: &QueueNames,
    ) -> Result<Arc<dyn Broker>> {
        Self::build(config, queues, true).await
    }

    async fn build(
        config: &BrokerConfig,
        queues: &QueueNames,
        allow_memory: bool,
    ) -> Result<Arc<dyn Broker>> {
        let broker: Arc<dyn Broker> = if config.url.starts_with("memory://") {
            if !allow_memory {
                anyhow::bail!(
                    "memory:// broker is only usable in standalone mode; configure an amqp:// URL"
                );
            }
            info!("Using in-process memory broker");
            Arc::new(MemoryBroker::new())
        } else if config.url.starts_with("amqp://") || config.url.starts_with("amqps://") {
            info!("Connecting to RabbitMQ broker");
            Arc::new(AmqpBroker::connect(&config.url).await?)
        } else {
            anyhow::bail!("Unsupported broker URL scheme: {}", config.url);
        };

        for queue in [&queues.detection, &queues.translation, &queues.status] {
            broker.declare_queue(queue).await?;
        }

        Ok(broker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> BrokerConfig {
        BrokerConfig {
            url: "memory://".to_string(),
            ..BrokerConfig::default()
        }
    }

    #[tokio::test]
    async fn memory_url_builds_an_in_process_broker() {
        let broker = BrokerFactory::create_in_process(&memory_config(), &QueueNames::default())
            .await
            .unwrap();
        broker.publish("status_queue", b"{}").await.unwrap();
    }

    #[tokio::test]
    async fn memory_url_is_rejected_for_a_single_role() {
        let err = BrokerFactory::create(&memory_config(), &QueueNames::default())
            .await
            .err()
            .expect("memory broker must be rejected");
        assert!(err.to_string().contains("standalone"));
    }

    #[tokio::test]
    async fn unknown_scheme_is_rejected() {
        let config = BrokerConfig {
            url: "redis://localhost".to_string(),
            ..BrokerConfig::default()
        };
        assert!(BrokerFactory::create(&config, &QueueNames::default())
            .await
            .is_err());
    }
}
