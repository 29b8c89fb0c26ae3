use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::delivery::{Acker, Delivery, Subscription};
use crate::error::QueueError;
use crate::MessageQueue;

#[derive(Default)]
struct Channel {
    ready: Mutex<VecDeque<String>>,
    unacked: Mutex<usize>,
    notify: Notify,
}

impl Channel {
    fn push_back(&self, payload: String) {
        self.ready.lock().unwrap_or_else(PoisonError::into_inner).push_back(payload);
        self.notify.notify_waiters();
    }

    fn push_front(&self, payload: String) {
        self.ready.lock().unwrap_or_else(PoisonError::into_inner).push_front(payload);
        self.notify.notify_waiters();
    }

    fn pop(&self) -> Option<String> {
        let payload = self.ready.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        if payload.is_some() {
            *self.unacked.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        }
        payload
    }

    fn settle(&self) {
        let mut unacked = self.unacked.lock().unwrap_or_else(PoisonError::into_inner);
        *unacked = unacked.saturating_sub(1);
    }

    async fn next(&self, stop: &CancellationToken) -> Option<String> {
        loop {
            let notified = self.notify.notified();
            if let Some(payload) = self.pop() {
                return Some(payload);
            }
            tokio::select! {
                _ = stop.cancelled() => return None,
                _ = notified => {}
            }
        }
    }
}

struct ChannelAcker {
    queue: String,
    channel: Arc<Channel>,
}

#[async_trait]
impl Acker for ChannelAcker {
    async fn ack(&self, _payload: &str) -> Result<(), QueueError> {
        self.channel.settle();
        Ok(())
    }

    async fn nack(&self, payload: &str, requeue: bool) -> Result<(), QueueError> {
        self.channel.settle();
        if requeue {
            self.channel.push_front(payload.to_string());
        } else {
            warn!(queue = %self.queue, payload, "dropping rejected message");
        }
        Ok(())
    }
}

/// In-process queue with the same delivery rules as the redis one. Messages do not survive the
/// process.
pub struct MemoryQueue {
    channels: Mutex<HashMap<String, Arc<Channel>>>,
    shutdown: CancellationToken,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self { channels: Mutex::new(HashMap::new()), shutdown: CancellationToken::new() }
    }

    /// Messages waiting for a consumer.
    pub fn ready(&self, queue: &str) -> usize {
        self.channel(queue).ready.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Messages handed out and not yet acked or nacked.
    pub fn unacked(&self, queue: &str) -> usize {
        *self.channel(queue).unacked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the waiting payloads, head first.
    pub fn peek(&self, queue: &str) -> Vec<String> {
        let channel = self.channel(queue);
        let ready = channel.ready.lock().unwrap_or_else(PoisonError::into_inner);
        ready.iter().cloned().collect()
    }

    fn channel(&self, queue: &str) -> Arc<Channel> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(channels.entry(queue.to_string()).or_default())
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn publish(&self, queue: &str, payload: &str) -> Result<(), QueueError> {
        if self.shutdown.is_cancelled() {
            return Err(QueueError::Closed);
        }
        debug!(queue, payload, "publish");
        self.channel(queue).push_back(payload.to_string());
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        tag: &str,
        prefetch: usize,
    ) -> Result<Subscription, QueueError> {
        if self.shutdown.is_cancelled() {
            return Err(QueueError::Closed);
        }

        let channel = self.channel(queue);
        let acker: Arc<dyn Acker> =
            Arc::new(ChannelAcker { queue: queue.to_string(), channel: Arc::clone(&channel) });
        let permits = Arc::new(Semaphore::new(prefetch.max(1)));
        let stop = self.shutdown.child_token();
        let (tx, rx) = mpsc::channel(prefetch.max(1));

        info!(queue, tag, prefetch, "consumer started");
        let pump_stop = stop.clone();
        tokio::spawn(async move {
            loop {
                let permit = tokio::select! {
                    _ = pump_stop.cancelled() => break,
                    permit = Arc::clone(&permits).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };
                let Some(payload) = channel.next(&pump_stop).await else { break };

                let delivery = Delivery::new(payload, Arc::clone(&acker), permit);
                if let Err(err) = tx.send(delivery).await {
                    // subscriber went away before taking it
                    let delivery = err.0;
                    channel.settle();
                    channel.push_front(delivery.payload().to_string());
                    break;
                }
            }
        });

        Ok(Subscription::new(rx, stop))
    }

    async fn close(&self) -> Result<(), QueueError> {
        if !self.shutdown.is_cancelled() {
            info!("closing memory queue");
            self.shutdown.cancel();
        }
        Ok(())
    }
}
