use std::time::Duration;

use sync::batch::BatchOptions;

pub struct IndexerArgs {
    /// Scan workers running in parallel.
    pub workers: usize,
    /// Unacknowledged job messages held at once.
    pub prefetch: usize,
    pub batch: BatchOptions,
    /// Pause before a failed job goes back on the queue.
    pub requeue_delay: Duration,
}

impl Default for IndexerArgs {
    fn default() -> Self {
        Self {
            workers: 4,
            prefetch: 1,
            batch: BatchOptions::default(),
            requeue_delay: Duration::from_secs(1),
        }
    }
}

pub struct ProducerArgs {
    pub poll_interval: Duration,
    /// Raises the stored cursor to this block when it is lower.
    pub start_block: Option<u64>,
    /// Unacknowledged completion notices held at once.
    pub prefetch: usize,
    /// Pause before a completion notice whose cursor write failed goes back on the queue.
    pub requeue_delay: Duration,
}

impl Default for ProducerArgs {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            start_block: None,
            prefetch: 1,
            requeue_delay: Duration::from_secs(1),
        }
    }
}
