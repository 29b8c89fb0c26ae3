use queue::Delivery;
use tokio::sync::oneshot;
use tracing::{error, warn};

/// A block number taken from the job queue, on its way through a scan worker.
#[derive(Debug)]
pub struct Job {
    pub number: u64,
    pub delivery: Delivery,
    /// Written exactly once, by the worker that ran the scan.
    pub done: oneshot::Sender<JobResult>,
}

#[derive(Debug)]
pub struct JobResult {
    /// `None` when the scan failed.
    pub number: Option<u64>,
    pub delivery: Delivery,
}

impl Job {
    pub fn new(number: u64, delivery: Delivery) -> (Self, oneshot::Receiver<JobResult>) {
        let (done, rx) = oneshot::channel();
        (Self { number, delivery, done }, rx)
    }

    pub async fn finish(self, scanned: bool) {
        let result = JobResult { number: scanned.then_some(self.number), delivery: self.delivery };
        // the completion loop is gone only during shutdown
        if let Err(result) = self.done.send(result) {
            requeue(result.delivery, self.number).await;
        }
    }

    /// Returns the job to the queue unscanned.
    pub async fn abandon(self) {
        requeue(self.delivery, self.number).await;
    }
}

async fn requeue(delivery: Delivery, number: u64) {
    warn!(number, "returning unsettled job to the queue");
    if let Err(err) = delivery.nack(true).await {
        error!(number, error = %err, "failed to requeue job message");
    }
}

/// Decimal block number carried by job and completion messages.
pub fn parse_block_number(payload: &str) -> Option<u64> {
    payload.trim().parse().ok()
}
