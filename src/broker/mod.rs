pub mod interface;
pub mod amqp;
pub mod memory;
pub mod publisher;
pub mod consumer;
pub mod factory;

pub use interface::{Broker, BrokerError, Delivery, QueueConsumer};
pub use amqp::AmqpBroker;
pub use memory::MemoryBroker;
pub use publisher::QueuePublisher;
pub use consumer::{ConsumerSettings, ConsumerWorker, DeliveryHandler};
pub use factory::BrokerFactory;
