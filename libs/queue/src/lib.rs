pub mod delivery;
pub mod error;
pub mod memory;
pub mod redis_queue;

use std::sync::Arc;

use async_trait::async_trait;

pub use delivery::{Acker, Delivery, Subscription};
pub use error::QueueError;
pub use memory::MemoryQueue;
pub use redis_queue::RedisQueue;

/// Block numbers waiting to be scanned.
pub const JOB_QUEUE: &str = "blockNumber_queue";
/// Block numbers whose scan finished.
pub const DONE_QUEUE: &str = "blockNumber_done_queue";

pub const INDEXER_TAG: &str = "indexer_service";
pub const PRODUCER_TAG: &str = "producer_service";

/// A durable work queue with manual acknowledgment.
///
/// Payloads are plain strings. A consumer holds at most `prefetch` unacknowledged deliveries;
/// the next one is handed out only after an earlier one is acked or nacked.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn publish(&self, queue: &str, payload: &str) -> Result<(), QueueError>;

    async fn consume(
        &self,
        queue: &str,
        tag: &str,
        prefetch: usize,
    ) -> Result<Subscription, QueueError>;

    /// Stops every subscription and rejects later publishes. Idempotent.
    async fn close(&self) -> Result<(), QueueError>;
}

/// Opens the queue behind `url`: `memory://` for an in-process queue, `redis://` or `rediss://`
/// for a redis server.
pub async fn connect(url: &str) -> Result<Arc<dyn MessageQueue>, QueueError> {
    let queue: Arc<dyn MessageQueue> = if url.starts_with("memory://") {
        Arc::new(MemoryQueue::new())
    } else if url.starts_with("redis://") || url.starts_with("rediss://") {
        Arc::new(RedisQueue::connect(url).await?)
    } else {
        return Err(QueueError::UnsupportedUrl(url.to_string()));
    };
    Ok(queue)
}
