use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::marker::PhantomData;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::broker::{ConsumerWorker, DeliveryHandler};
use crate::errors::{PipelineError, Result};
use crate::shutdown::StopFlag;

/// Decodes each delivery and pushes it into an in-process hand-off buffer
/// read by the event loop.
pub struct JsonHandoff<T> {
    label: &'static str,
    tx: mpsc::UnboundedSender<T>,
    _message: PhantomData<fn() -> T>,
}

impl<T> JsonHandoff<T> {
    pub fn new(label: &'static str, tx: mpsc::UnboundedSender<T>) -> Self {
        Self {
            label,
            tx,
            _message: PhantomData,
        }
    }
}

#[async_trait]
impl<T> DeliveryHandler for JsonHandoff<T>
where
    T: DeserializeOwned + Debug + Send + 'static,
{
    async fn handle(&mut self, payload: &[u8]) -> Result<()> {
        let message: T = serde_json::from_slice(payload)?;
        debug!("Message added to the {} buffer: {:?}", self.label, message);
        self.tx.send(message).map_err(|_| PipelineError::Cancelled)
    }
}

/// The gateway's two consumer threads and the stop flag they share
pub struct BackgroundConsumers {
    stop: StopFlag,
    workers: Vec<ConsumerWorker>,
}

impl BackgroundConsumers {
    pub fn new(stop: StopFlag, workers: Vec<ConsumerWorker>) -> Self {
        Self { stop, workers }
    }

    pub fn queues(&self) -> Vec<&str> {
        self.workers.iter().map(|w| w.queue()).collect()
    }

    /// Signal every consumer and block until all of them have exited.
    pub fn stop_and_join(self) {
        info!("Stopping background tasks...");
        self.stop.set();
        for worker in self.workers {
            worker.join();
        }
        info!("Background tasks stopped");
    }
}
