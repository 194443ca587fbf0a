use async_trait::async_trait;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::interface::Broker;
use crate::config::BrokerConfig;
use crate::errors::Result;
use crate::shutdown::StopFlag;

/// Processes one delivery. The loop acknowledges the message after this
/// returns, whether it succeeded or not: a handler error is a terminal drop.
#[async_trait]
pub trait DeliveryHandler: Send + 'static {
    async fn handle(&mut self, payload: &[u8]) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct ConsumerSettings {
    /// Upper bound on how long a poll waits before re-checking the stop flag
    pub poll_interval: Duration,
    pub reconnect_delay: Duration,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

impl ConsumerSettings {
    pub fn from_config(config: &BrokerConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            reconnect_delay: config.reconnect_delay(),
        }
    }
}

/// A consume loop running on its own OS thread with its own single-threaded
/// runtime, so broker polling never runs on the server's event loop.
pub struct ConsumerWorker {
    queue: String,
    thread: JoinHandle<()>,
}

impl ConsumerWorker {
    pub fn spawn<H: DeliveryHandler>(
        broker: Arc<dyn Broker>,
        queue: &str,
        handler: H,
        stop: StopFlag,
        settings: ConsumerSettings,
    ) -> std::io::Result<Self> {
        let queue_name = queue.to_string();
        let thread = thread::Builder::new()
            .name(format!("consumer-{queue}"))
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to build consumer runtime for '{}': {}", queue_name, e);
                        return;
                    }
                };
                runtime.block_on(consume_loop(broker, queue_name, handler, stop, settings));
            })?;

        info!("Started consumer thread for '{}'", queue);
        Ok(Self {
            queue: queue.to_string(),
            thread,
        })
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until the loop has exited. Set the stop flag first.
    pub fn join(self) {
        if self.thread.join().is_err() {
            error!("Consumer thread for '{}' panicked", self.queue);
        } else {
            info!("'{}' consumer thread closed", self.queue);
        }
    }
}

async fn consume_loop<H: DeliveryHandler>(
    broker: Arc<dyn Broker>,
    queue: String,
    mut handler: H,
    stop: StopFlag,
    settings: ConsumerSettings,
) {
    while !stop.is_set() {
        let mut consumer = match broker.consume(&queue).await {
            Ok(consumer) => consumer,
            Err(e) => {
                error!("Failed to start consumer on '{}': {}", queue, e);
                tokio::time::sleep(settings.reconnect_delay.min(settings.poll_interval)).await;
                continue;
            }
        };

        info!("Waiting for messages on '{}'...", queue);
        while !stop.is_set() {
            let delivery = match consumer.next_delivery(settings.poll_interval).await {
                Ok(Some(delivery)) => delivery,
                Ok(None) => continue,
                Err(e) => {
                    error!("Error during message consumption on '{}': {}", queue, e);
                    break;
                }
            };

            debug!(
                "Received message {} from '{}' (redelivered: {})",
                delivery.tag, queue, delivery.redelivered
            );
            if let Err(e) = handler.handle(&delivery.payload).await {
                error!("Error processing message from '{}': {}", queue, e);
            }
            if let Err(e) = consumer.ack(&delivery).await {
                error!("Failed to acknowledge message on '{}': {}", queue, e);
                break;
            }
        }

        if let Err(e) = consumer.close().await {
            warn!("Error closing consumer on '{}': {}", queue, e);
        }
    }
    info!("Consumer loop for '{}' stopped", queue);
}
