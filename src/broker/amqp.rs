use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::{
    options::*, types::FieldTable, BasicProperties, Channel, Connection, ConnectionProperties,
    Consumer,
};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::interface::{Broker, BrokerError, Delivery, QueueConsumer};

/// Map lapin failures onto the broker taxonomy. Anything that means the
/// channel or connection is no longer usable becomes `ChannelClosed`.
fn classify(err: lapin::Error, fallback: fn(String) -> BrokerError) -> BrokerError {
    match &err {
        lapin::Error::InvalidChannelState(_)
        | lapin::Error::InvalidConnectionState(_)
        | lapin::Error::IOError(_) => BrokerError::ChannelClosed(err.to_string()),
        _ => fallback(err.to_string()),
    }
}

struct AmqpLink {
    connection: Connection,
    channel: Channel,
}

impl AmqpLink {
    async fn open(url: &str) -> Result<Self, BrokerError> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| BrokerError::Connection(format!("Failed to connect to RabbitMQ: {e}")))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::Connection(format!("Failed to create channel: {e}")))?;

        Ok(Self {
            connection,
            channel,
        })
    }

    fn is_open(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }

    async fn declare(&self, queue: &str) -> Result<(), BrokerError> {
        self.channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| classify(e, BrokerError::Connection))?;
        Ok(())
    }

    async fn close(&self, reason: &str) {
        if let Err(e) = self.channel.close(200, reason).await {
            debug!("Channel close: {}", e);
        }
        if let Err(e) = self.connection.close(200, reason).await {
            debug!("Connection close: {}", e);
        }
    }
}

/// RabbitMQ broker over lapin. Publishes go to the default exchange with the
/// queue name as routing key.
pub struct AmqpBroker {
    url: String,
    link: Mutex<Option<AmqpLink>>,
}

impl AmqpBroker {
    /// Connect the publishing channel. Failing here aborts the caller's startup.
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let link = AmqpLink::open(url).await?;
        info!("RabbitMQ connection and channel setup completed");
        Ok(Self {
            url: url.to_string(),
            link: Mutex::new(Some(link)),
        })
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError> {
        let guard = self.link.lock().await;
        let link = guard
            .as_ref()
            .ok_or_else(|| BrokerError::ChannelClosed("no open channel".to_string()))?;
        link.declare(queue).await?;
        debug!("Declared queue {}", queue);
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let guard = self.link.lock().await;
        let link = guard
            .as_ref()
            .filter(|link| link.is_open())
            .ok_or_else(|| BrokerError::ChannelClosed("publish channel is closed".to_string()))?;

        link.channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(2),
            )
            .await
            .map_err(|e| classify(e, BrokerError::Publish))?
            .await
            .map_err(|e| classify(e, BrokerError::Publish))?;

        debug!("Published {} bytes to queue '{}'", payload.len(), queue);
        Ok(())
    }

    async fn reconnect(&self) -> Result<(), BrokerError> {
        let mut guard = self.link.lock().await;
        if let Some(old) = guard.take() {
            old.close("reconnecting").await;
        }
        warn!("Re-establishing RabbitMQ connection...");
        *guard = Some(AmqpLink::open(&self.url).await?);
        info!("RabbitMQ connection re-established");
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<Box<dyn QueueConsumer>, BrokerError> {
        let link = AmqpLink::open(&self.url).await?;
        link.declare(queue).await?;

        // One unacknowledged message at a time per consumer.
        link.channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .map_err(|e| classify(e, BrokerError::Consume))?;

        let consumer = link
            .channel
            .basic_consume(
                queue,
                "",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| classify(e, BrokerError::Consume))?;

        info!("Consuming from queue '{}'", queue);
        Ok(Box::new(AmqpConsumer { link, consumer }))
    }
}

pub struct AmqpConsumer {
    link: AmqpLink,
    consumer: Consumer,
}

#[async_trait]
impl QueueConsumer for AmqpConsumer {
    async fn next_delivery(&mut self, wait: Duration) -> Result<Option<Delivery>, BrokerError> {
        match tokio::time::timeout(wait, self.consumer.next()).await {
            Err(_) => Ok(None),
            Ok(None) => Err(BrokerError::ChannelClosed(
                "consumer stream ended".to_string(),
            )),
            Ok(Some(Err(e))) => Err(classify(e, BrokerError::Consume)),
            Ok(Some(Ok(delivery))) => Ok(Some(Delivery {
                tag: delivery.delivery_tag,
                redelivered: delivery.redelivered,
                payload: delivery.data,
            })),
        }
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<(), BrokerError> {
        self.link
            .channel
            .basic_ack(delivery.tag, BasicAckOptions::default())
            .await
            .map_err(|e| classify(e, BrokerError::Ack))
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        self.link.close("consumer stopped").await;
        info!("RabbitMQ consumer connection closed");
        Ok(())
    }
}
