use std::sync::Arc;
use std::time::Duration;

use chain::scanner::Scanner;
use eyre::{Result, WrapErr, eyre};
use queue::{DONE_QUEUE, INDEXER_TAG, JOB_QUEUE, MessageQueue, Subscription};
use store::adapter;
use store::model::{BlockRow, LogRow, TransactionRow};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::job::{Job, JobResult, parse_block_number};

/// Capacity of the channel between the dispatch loop and the workers.
pub const JOB_CHANNEL_CAPACITY: usize = 1000;

/// Inputs of the three batch writers.
#[derive(Clone)]
pub struct Writers {
    pub blocks: mpsc::UnboundedSender<BlockRow>,
    pub transactions: mpsc::UnboundedSender<TransactionRow>,
    pub logs: mpsc::UnboundedSender<LogRow>,
}

/// Takes block numbers off the job queue, scans them on a pool of workers and settles each
/// message once its scan is over.
///
/// Messages are settled in the order they were received: a completed scan publishes a
/// completion notice and acks the job; a failed one goes back on the queue after
/// `requeue_delay`. Jobs still unsettled at shutdown are returned to the queue.
pub struct Distributor {
    handles: Vec<JoinHandle<()>>,
}

impl Distributor {
    pub async fn spawn(
        workers: usize,
        prefetch: usize,
        queue: Arc<dyn MessageQueue>,
        scanner: Arc<Scanner>,
        writers: Writers,
        requeue_delay: Duration,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let subscription = queue
            .consume(JOB_QUEUE, INDEXER_TAG, prefetch)
            .await
            .wrap_err("failed to consume the job queue")?;

        let (job_tx, job_rx) = async_channel::bounded::<Job>(JOB_CHANNEL_CAPACITY);
        let (pending_tx, pending_rx) = mpsc::unbounded_channel();

        let mut handles = Vec::with_capacity(workers + 2);
        handles.push(tokio::spawn(dispatch(subscription, job_tx, pending_tx, shutdown.clone())));
        for id in 0..workers.max(1) {
            handles.push(tokio::spawn(work(
                id,
                job_rx.clone(),
                Arc::clone(&scanner),
                writers.clone(),
                shutdown.clone(),
            )));
        }
        handles.push(tokio::spawn(complete(pending_rx, queue, requeue_delay, shutdown)));

        info!(workers, prefetch, "job distributor started");
        Ok(Self { handles })
    }

    /// Waits for every loop to exit. Call after cancelling the shutdown token.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                error!(error = %err, "distributor task failed");
            }
        }
    }
}

async fn dispatch(
    mut subscription: Subscription,
    jobs: async_channel::Sender<Job>,
    pending: mpsc::UnboundedSender<oneshot::Receiver<JobResult>>,
    shutdown: CancellationToken,
) {
    loop {
        let delivery = tokio::select! {
            _ = shutdown.cancelled() => break,
            delivery = subscription.next() => match delivery {
                Some(delivery) => delivery,
                None => break,
            },
        };

        let Some(number) = parse_block_number(delivery.payload()) else {
            warn!(payload = delivery.payload(), "dropping malformed job message");
            if let Err(err) = delivery.nack(false).await {
                error!(error = %err, "failed to reject job message");
            }
            continue;
        };

        let (job, done) = Job::new(number, delivery);
        if pending.send(done).is_err() {
            break;
        }
        debug!(number, "dispatching job");
        let sent = tokio::select! {
            _ = shutdown.cancelled() => break,
            sent = jobs.send(job) => sent,
        };
        if sent.is_err() {
            break;
        }
    }

    jobs.close();
    debug!("dispatch loop stopped");
}

async fn work(
    id: usize,
    jobs: async_channel::Receiver<Job>,
    scanner: Arc<Scanner>,
    writers: Writers,
    shutdown: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            _ = shutdown.cancelled() => break,
            job = jobs.recv() => match job {
                Ok(job) => job,
                Err(_) => break,
            },
        };

        let number = job.number;
        let scanned = tokio::select! {
            _ = shutdown.cancelled() => {
                job.abandon().await;
                break;
            }
            scanned = scan_block(&scanner, &writers, number) => scanned,
        };
        match scanned {
            Ok(()) => {
                debug!(worker = id, number, "scanned block");
                job.finish(true).await;
            }
            Err(err) => {
                error!(worker = id, number, error = ?err, "block scan failed");
                job.finish(false).await;
            }
        }
    }

    // dispatched but never picked up
    while let Ok(job) = jobs.try_recv() {
        job.abandon().await;
    }
    debug!(worker = id, "scan worker stopped");
}

/// Fetches one block with its transactions and logs and hands the rows to the writers.
pub async fn scan_block(scanner: &Scanner, writers: &Writers, number: u64) -> Result<()> {
    let block = scanner.block_by_number(number).await?;
    let row = BlockRow::try_from(&block)?;
    writers.blocks.send(row).map_err(|_| eyre!("block writer is closed"))?;

    for tx in &block.transactions {
        let row = TransactionRow::try_from(tx)?;
        writers.transactions.send(row).map_err(|_| eyre!("transaction writer is closed"))?;

        let (_, is_pending) = scanner.transaction_detail(tx.hash).await?;
        if is_pending {
            continue;
        }
        let logs = scanner.receipt_logs(tx.hash).await?;
        for row in adapter::log_rows(tx.hash, &logs) {
            writers.logs.send(row).map_err(|_| eyre!("log writer is closed"))?;
        }
    }

    Ok(())
}

async fn complete(
    mut pending: mpsc::UnboundedReceiver<oneshot::Receiver<JobResult>>,
    queue: Arc<dyn MessageQueue>,
    requeue_delay: Duration,
    shutdown: CancellationToken,
) {
    loop {
        let mut done = tokio::select! {
            _ = shutdown.cancelled() => break,
            done = pending.recv() => match done {
                Some(done) => done,
                None => break,
            },
        };

        let result = tokio::select! {
            _ = shutdown.cancelled() => {
                // the worker holding it requeues it, unless it already finished
                if let Ok(result) = done.try_recv() {
                    requeue_result(result).await;
                }
                break;
            }
            result = &mut done => result,
        };
        match result {
            Ok(result) => settle(queue.as_ref(), result, requeue_delay, &shutdown).await,
            Err(_) => warn!("job abandoned before completion"),
        }
    }

    // finished scans whose turn never came
    pending.close();
    while let Ok(mut done) = pending.try_recv() {
        if let Ok(result) = done.try_recv() {
            requeue_result(result).await;
        }
    }
    debug!("completion loop stopped");
}

async fn settle(
    queue: &dyn MessageQueue,
    result: JobResult,
    requeue_delay: Duration,
    shutdown: &CancellationToken,
) {
    let JobResult { number, delivery } = result;

    let Some(number) = number else {
        warn!(payload = delivery.payload(), delay = ?requeue_delay, "requeueing failed job");
        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = tokio::time::sleep(requeue_delay) => {}
        }
        if let Err(err) = delivery.nack(true).await {
            error!(error = %err, "failed to requeue job message");
        }
        return;
    };

    match queue.publish(DONE_QUEUE, &number.to_string()).await {
        Ok(()) => {
            if let Err(err) = delivery.ack().await {
                error!(number, error = %err, "failed to ack job message");
            }
        }
        Err(err) => {
            error!(number, error = %err, "failed to publish completion, requeueing job");
            if let Err(err) = delivery.nack(true).await {
                error!(number, error = %err, "failed to requeue job message");
            }
        }
    }
}

async fn requeue_result(result: JobResult) {
    warn!(payload = result.delivery.payload(), "returning unsettled job to the queue");
    if let Err(err) = result.delivery.nack(true).await {
        error!(error = %err, "failed to requeue job message");
    }
}
