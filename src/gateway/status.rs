use serde::Serialize;
use std::sync::Mutex;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, warn};

use crate::models::StatusMessage;

pub const NO_STATUS_AVAILABLE: &str = "No status message available.";

/// Gateway side of the `status` hand-off buffer. Reads never wait.
pub struct StatusBuffer {
    rx: Mutex<mpsc::UnboundedReceiver<StatusMessage>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StatusReply {
    Message(StatusMessage),
    Empty { status: String },
}

impl StatusBuffer {
    pub fn new(rx: mpsc::UnboundedReceiver<StatusMessage>) -> Self {
        Self { rx: Mutex::new(rx) }
    }

    /// Next buffered status message, if any
    pub fn try_next(&self) -> Option<StatusMessage> {
        let mut rx = self
            .rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match rx.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                warn!("Status consumer is gone; no further status messages");
                None
            }
        }
    }

    pub fn next_reply(&self) -> StatusReply {
        match self.try_next() {
            Some(message) => StatusReply::Message(message),
            None => {
                debug!("Status message queue is empty");
                StatusReply::Empty {
                    status: NO_STATUS_AVAILABLE.to_string(),
                }
            }
        }
    }
}
