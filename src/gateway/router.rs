use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{PipelineError, Result};
use crate::models::TranslationResult;

/// Routes results drained from the `translation` hand-off buffer to the
/// connection turn waiting on the same correlation id.
///
/// A waiter is removed the moment a result is handed to it, so at most one
/// result is ever delivered per id. Results nobody is waiting for (late,
/// duplicated or foreign) are logged and dropped.
#[derive(Default)]
pub struct ResultRouter {
    pending: DashMap<String, oneshot::Sender<TranslationResult>>,
}

impl ResultRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `id`. Must happen before the request is sent
    /// down the pipeline so a fast result cannot be missed.
    pub fn register(self: &Arc<Self>, id: &str) -> PendingResult {
        let (tx, rx) = oneshot::channel();
        if self.pending.insert(id.to_string(), tx).is_some() {
            warn!("Replaced an existing waiter for request {}", id);
        }
        PendingResult {
            id: id.to_string(),
            rx,
            router: Arc::clone(self),
        }
    }

    /// Hand a result to its waiter. Returns whether anyone received it.
    pub fn deliver(&self, result: TranslationResult) -> bool {
        match self.pending.remove(&result.id) {
            Some((id, tx)) => {
                debug!("Routing translation result {}", id);
                tx.send(result).is_ok()
            }
            None => {
                warn!("No waiter for translation result {}; dropping it", result.id);
                false
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn forget(&self, id: &str) {
        self.pending.remove(id);
    }

    /// Drain the hand-off buffer until its sending side is gone.
    pub fn spawn_dispatcher(
        self: &Arc<Self>,
        mut handoff: mpsc::UnboundedReceiver<TranslationResult>,
    ) -> JoinHandle<()> {
        let router = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(result) = handoff.recv().await {
                router.deliver(result);
            }
            info!("Translation result dispatcher stopped");
        })
    }
}

/// A registered wait for one translation result. Dropping it unregisters
/// the id, so abandoned turns never leave stale waiters behind.
pub struct PendingResult {
    id: String,
    rx: oneshot::Receiver<TranslationResult>,
    router: Arc<ResultRouter>,
}

impl PendingResult {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the result. A zero `timeout` waits without bound.
    pub async fn wait(mut self, timeout: Duration) -> Result<TranslationResult> {
        let received = if timeout.is_zero() {
            (&mut self.rx).await
        } else {
            match tokio::time::timeout(timeout, &mut self.rx).await {
                Ok(received) => received,
                Err(_) => {
                    warn!("Timed out waiting for translation result {}", self.id);
                    return Err(PipelineError::Timeout(format!(
                        "translation result {}",
                        self.id
                    )));
                }
            }
        };

        received.map_err(|_| PipelineError::Cancelled)
    }
}

impl Drop for PendingResult {
    fn drop(&mut self) {
        self.router.forget(&self.id);
    }
}
