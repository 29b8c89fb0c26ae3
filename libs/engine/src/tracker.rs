use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use eyre::{Result, WrapErr};
use queue::{DONE_QUEUE, JOB_QUEUE, MessageQueue, PRODUCER_TAG, QueueError, Subscription};
use store::facade::Storage;
use sync::consumer::Consumer;
use sync::producer::Producer;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::args::ProducerArgs;
use crate::job::parse_block_number;
use crate::progress::{Progress, Record};

/// Publishes a job per unscanned block and moves the persisted cursor as scans complete.
pub struct Tracker {
    queue: Arc<dyn MessageQueue>,
    storage: Arc<Storage>,
    shutdown: CancellationToken,
    cursor: Arc<AtomicU64>,
    published: Arc<AtomicU64>,
    handles: Mutex<Option<Vec<JoinHandle<()>>>>,
    closed: AtomicBool,
}

impl Tracker {
    /// Publishes the backlog from the stored cursor up to the current height, then keeps polling
    /// for new blocks and listening for completions in the background.
    pub async fn start(
        args: &ProducerArgs,
        storage: Arc<Storage>,
        queue: Arc<dyn MessageQueue>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let mut cursor =
            storage.latest_block_number().await.wrap_err("failed to read the stored cursor")?;
        if let Some(start_block) = args.start_block.filter(|start| *start > cursor) {
            storage
                .update_latest_block_number(start_block)
                .await
                .wrap_err("failed to raise the stored cursor")?;
            cursor = start_block;
        }

        let height = storage
            .scanner()
            .latest_block_number()
            .await
            .wrap_err("failed to read the upstream height")?;
        info!(cursor, height, "starting producer");

        publish_range(queue.as_ref(), cursor + 1, height)
            .await
            .wrap_err("failed to publish the job backlog")?;

        let notices = queue
            .consume(DONE_QUEUE, PRODUCER_TAG, args.prefetch)
            .await
            .wrap_err("failed to consume the completion queue")?;

        let cursor_seen = Arc::new(AtomicU64::new(cursor));
        let published = Arc::new(AtomicU64::new(height.max(cursor)));

        let (height_tx, height_rx) = mpsc::channel::<u64>(16);
        let poller = Producer::spawn(height_tx, args.poll_interval, shutdown.clone(), {
            let storage = Arc::clone(&storage);
            move || {
                let storage = Arc::clone(&storage);
                async move {
                    match storage.scanner().latest_block_number().await {
                        Ok(height) => Some(height),
                        Err(err) => {
                            warn!(error = %err, "failed to poll the upstream height");
                            None
                        }
                    }
                }
            }
        });
        let publisher = Consumer::spawn(height_rx, shutdown.clone(), {
            let queue = Arc::clone(&queue);
            let published = Arc::clone(&published);
            move |height: u64| {
                let queue = Arc::clone(&queue);
                let published = Arc::clone(&published);
                async move { publish_new_blocks(queue.as_ref(), &published, height).await }
            }
        });
        let listener = tokio::spawn(listen(
            notices,
            Progress::new(cursor),
            Arc::clone(&storage),
            Arc::clone(&cursor_seen),
            args.requeue_delay,
            shutdown.clone(),
        ));

        Ok(Self {
            queue,
            storage,
            shutdown,
            cursor: cursor_seen,
            published,
            handles: Mutex::new(Some(vec![poller, publisher, listener])),
            closed: AtomicBool::new(false),
        })
    }

    /// Cursor as last persisted by this tracker.
    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::SeqCst)
    }

    /// Highest block number published as a job.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }

    /// Stops polling and listening, then closes the queue and the scanner. Idempotent.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("stopping producer");
        self.shutdown.cancel();

        let handles = self.handles.lock().await.take().unwrap_or_default();
        for handle in handles {
            if let Err(err) = handle.await {
                error!(error = %err, "producer task failed");
            }
        }

        if let Err(err) = self.queue.close().await {
            warn!(error = %err, "failed to close the queue");
        }
        self.storage.scanner().close();
        info!(cursor = self.cursor(), "producer stopped");
    }
}

async fn publish_range(queue: &dyn MessageQueue, from: u64, to: u64) -> Result<(), QueueError> {
    for number in from..=to {
        queue.publish(JOB_QUEUE, &number.to_string()).await?;
    }
    if from <= to {
        info!(from, to, "published jobs");
    }
    Ok(())
}

async fn publish_new_blocks(queue: &dyn MessageQueue, published: &AtomicU64, height: u64) {
    let from = published.load(Ordering::SeqCst) + 1;
    if height < from {
        return;
    }
    for number in from..=height {
        if let Err(err) = queue.publish(JOB_QUEUE, &number.to_string()).await {
            // the next poll starts again from here
            error!(number, error = %err, "failed to publish job");
            return;
        }
        published.store(number, Ordering::SeqCst);
    }
    info!(from, to = height, "published jobs");
}

async fn listen(
    mut notices: Subscription,
    mut progress: Progress,
    storage: Arc<Storage>,
    cursor: Arc<AtomicU64>,
    requeue_delay: Duration,
    shutdown: CancellationToken,
) {
    loop {
        let notice = tokio::select! {
            _ = shutdown.cancelled() => break,
            notice = notices.next() => match notice {
                Some(notice) => notice,
                None => break,
            },
        };

        let Some(number) = parse_block_number(notice.payload()) else {
            warn!(payload = notice.payload(), "dropping malformed completion notice");
            if let Err(err) = notice.nack(false).await {
                error!(error = %err, "failed to reject completion notice");
            }
            continue;
        };

        let mut next = progress.clone();
        let settled = match next.record(number) {
            Record::Stale => {
                debug!(number, confirmed = progress.confirmed(), "stale completion notice");
                notice.ack().await
            }
            Record::Held => {
                debug!(number, held = next.held(), "completion waits for a lower block");
                progress = next;
                notice.ack().await
            }
            Record::Advanced(to) => match storage.update_latest_block_number(to).await {
                Ok(()) => {
                    info!(cursor = to, "advanced cursor");
                    progress = next;
                    cursor.store(to, Ordering::SeqCst);
                    notice.ack().await
                }
                Err(err) => {
                    error!(number, cursor = to, error = %err, "failed to persist cursor");
                    tokio::select! {
                        _ = shutdown.cancelled() => {}
                        _ = tokio::time::sleep(requeue_delay) => {}
                    }
                    notice.nack(true).await
                }
            },
        };
        if let Err(err) = settled {
            error!(number, error = %err, "failed to settle completion notice");
        }
    }

    debug!("completion listener stopped");
}
