use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::QueueError;

/// Settles deliveries with the queue they came from.
#[async_trait]
pub trait Acker: Send + Sync {
    async fn ack(&self, payload: &str) -> Result<(), QueueError>;

    /// Returns the message to the head of its queue when `requeue` is set, drops it otherwise.
    async fn nack(&self, payload: &str, requeue: bool) -> Result<(), QueueError>;
}

/// One message handed to a consumer. It holds a prefetch slot until acked or nacked.
pub struct Delivery {
    payload: String,
    acker: Arc<dyn Acker>,
    _permit: OwnedSemaphorePermit,
}

impl Delivery {
    pub(crate) fn new(payload: String, acker: Arc<dyn Acker>, permit: OwnedSemaphorePermit) -> Self {
        Self { payload, acker, _permit: permit }
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub async fn ack(self) -> Result<(), QueueError> {
        self.acker.ack(&self.payload).await
    }

    pub async fn nack(self, requeue: bool) -> Result<(), QueueError> {
        self.acker.nack(&self.payload, requeue).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery").field("payload", &self.payload).finish()
    }
}

/// Stream of deliveries for one consumer. Dropping it stops the consumer.
pub struct Subscription {
    rx: mpsc::Receiver<Delivery>,
    stop: CancellationToken,
}

impl Subscription {
    pub(crate) fn new(rx: mpsc::Receiver<Delivery>, stop: CancellationToken) -> Self {
        Self { rx, stop }
    }

    /// `None` once the consumer stopped.
    pub async fn next(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop.cancel();
        self.rx.close();

        // deliveries buffered but never handed out go back to their queue
        let Ok(handle) = tokio::runtime::Handle::try_current() else { return };
        while let Ok(delivery) = self.rx.try_recv() {
            handle.spawn(async move {
                if let Err(err) = delivery.nack(true).await {
                    warn!(error = %err, "failed to requeue undelivered message");
                }
            });
        }
    }
}
