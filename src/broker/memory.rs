use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

use super::interface::{Broker, BrokerError, Delivery, QueueConsumer};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct MemoryQueue {
    messages: Mutex<VecDeque<(Vec<u8>, bool)>>,
    notify: Notify,
}

impl MemoryQueue {
    fn push(&self, payload: Vec<u8>) {
        lock(&self.messages).push_back((payload, false));
        self.notify.notify_one();
    }

    fn requeue(&self, payload: Vec<u8>) {
        lock(&self.messages).push_front((payload, true));
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<(Vec<u8>, bool)> {
        lock(&self.messages).pop_front()
    }

    fn len(&self) -> usize {
        lock(&self.messages).len()
    }
}

#[derive(Default)]
struct Inner {
    queues: Mutex<HashMap<String, Arc<MemoryQueue>>>,
    published: Mutex<HashMap<String, Vec<Vec<u8>>>>,
    log_publishes: bool,
    queue_attempts: Mutex<HashMap<String, u32>>,
    channel_closed: AtomicBool,
    connection_broken: AtomicBool,
    publish_attempts: AtomicU32,
    reconnects: AtomicU32,
}

/// In-process broker with the same semantics the stages rely on from
/// RabbitMQ: named queues, competing consumers, explicit acks and
/// redelivery of anything a consumer took but never acknowledged.
///
/// It can simulate a closed channel and, when built with
/// `with_publish_log`, records every successful publication. Both exist for
/// tests; the log is never trimmed.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Broker that also records every successful publication
    pub fn with_publish_log() -> Self {
        Self {
            inner: Arc::new(Inner {
                log_publishes: true,
                ..Inner::default()
            }),
        }
    }

    fn queue(&self, name: &str) -> Arc<MemoryQueue> {
        lock(&self.inner.queues)
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Payloads successfully published to `queue`, in order. Always empty
    /// unless the broker was built with `with_publish_log`.
    pub fn published(&self, queue: &str) -> Vec<Vec<u8>> {
        lock(&self.inner.published)
            .get(queue)
            .cloned()
            .unwrap_or_default()
    }

    pub fn published_json<T: DeserializeOwned>(&self, queue: &str) -> Vec<T> {
        self.published(queue)
            .iter()
            .filter_map(|payload| serde_json::from_slice(payload).ok())
            .collect()
    }

    /// Messages waiting in `queue` that no consumer has taken yet
    pub fn pending(&self, queue: &str) -> usize {
        self.queue(queue).len()
    }

    /// Close the publishing channel; the next `reconnect` reopens it
    pub fn close_channel(&self) {
        self.inner.channel_closed.store(true, Ordering::SeqCst);
    }

    /// Close the channel and make every reconnect fail until `restore`
    pub fn break_connection(&self) {
        self.inner.connection_broken.store(true, Ordering::SeqCst);
        self.close_channel();
    }

    pub fn restore(&self) {
        self.inner.connection_broken.store(false, Ordering::SeqCst);
        self.inner.channel_closed.store(false, Ordering::SeqCst);
    }

    pub fn publish_attempts(&self) -> u32 {
        self.inner.publish_attempts.load(Ordering::SeqCst)
    }

    /// Publish attempts made against `queue`, successful or not
    pub fn publish_attempts_to(&self, queue: &str) -> u32 {
        lock(&self.inner.queue_attempts)
            .get(queue)
            .copied()
            .unwrap_or(0)
    }

    pub fn reconnects(&self) -> u32 {
        self.inner.reconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError> {
        self.queue(queue);
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError> {
        self.inner.publish_attempts.fetch_add(1, Ordering::SeqCst);
        *lock(&self.inner.queue_attempts)
            .entry(queue.to_string())
            .or_default() += 1;
        if self.inner.channel_closed.load(Ordering::SeqCst) {
            return Err(BrokerError::ChannelClosed("memory channel closed".to_string()));
        }

        if self.inner.log_publishes {
            lock(&self.inner.published)
                .entry(queue.to_string())
                .or_default()
                .push(payload.to_vec());
        }
        self.queue(queue).push(payload.to_vec());
        debug!("Published {} bytes to memory queue {}", payload.len(), queue);
        Ok(())
    }

    async fn reconnect(&self) -> Result<(), BrokerError> {
        self.inner.reconnects.fetch_add(1, Ordering::SeqCst);
        if self.inner.connection_broken.load(Ordering::SeqCst) {
            return Err(BrokerError::Connection("memory broker unreachable".to_string()));
        }
        self.inner.channel_closed.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<Box<dyn QueueConsumer>, BrokerError> {
        Ok(Box::new(MemoryConsumer {
            queue: self.queue(queue),
            unacked: HashMap::new(),
            next_tag: 1,
        }))
    }
}

pub struct MemoryConsumer {
    queue: Arc<MemoryQueue>,
    unacked: HashMap<u64, Vec<u8>>,
    next_tag: u64,
}

impl MemoryConsumer {
    fn requeue_unacked(&mut self) {
        let mut tags: Vec<u64> = self.unacked.keys().copied().collect();
        // Push back newest first so the oldest ends up at the head again.
        tags.sort_unstable_by(|a, b| b.cmp(a));
        for tag in tags {
            if let Some(payload) = self.unacked.remove(&tag) {
                self.queue.requeue(payload);
            }
        }
    }
}

#[async_trait]
impl QueueConsumer for MemoryConsumer {
    async fn next_delivery(&mut self, wait: Duration) -> Result<Option<Delivery>, BrokerError> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some((payload, redelivered)) = self.queue.pop() {
                let tag = self.next_tag;
                self.next_tag += 1;
                self.unacked.insert(tag, payload.clone());
                return Ok(Some(Delivery {
                    tag,
                    payload,
                    redelivered,
                }));
            }

            if tokio::time::timeout_at(deadline, self.queue.notify.notified())
                .await
                .is_err()
            {
                return Ok(None);
            }
        }
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<(), BrokerError> {
        self.unacked
            .remove(&delivery.tag)
            .map(|_| ())
            .ok_or_else(|| BrokerError::Ack(format!("unknown delivery tag {}", delivery.tag)))
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        self.requeue_unacked();
        Ok(())
    }
}

impl Drop for MemoryConsumer {
    fn drop(&mut self) {
        self.requeue_unacked();
    }
}
