use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use eyre::Result;
use queue::MessageQueue;
use store::facade::Storage;
use store::model::{BlockRow, LogRow, TransactionRow};
use sync::batch::BatchWriter;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::args::IndexerArgs;
use crate::distributor::{Distributor, Writers};
use crate::sink::rows::{BlockSink, LogSink, TransactionSink};

struct Running {
    distributor: Distributor,
    blocks: BatchWriter<BlockRow>,
    transactions: BatchWriter<TransactionRow>,
    logs: BatchWriter<LogRow>,
}

/// The scanning side: job distributor, scan workers and the three batch writers.
pub struct Indexer {
    queue: Arc<dyn MessageQueue>,
    storage: Arc<Storage>,
    shutdown: CancellationToken,
    running: Mutex<Option<Running>>,
    closed: AtomicBool,
}

impl Indexer {
    pub async fn start(
        args: &IndexerArgs,
        storage: Arc<Storage>,
        queue: Arc<dyn MessageQueue>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let blocks: BatchWriter<BlockRow> = BatchWriter::spawn(
            "blocks",
            Arc::new(BlockSink { storage: Arc::clone(&storage) }),
            args.batch.clone(),
        );
        let transactions: BatchWriter<TransactionRow> = BatchWriter::spawn(
            "transactions",
            Arc::new(TransactionSink { storage: Arc::clone(&storage) }),
            args.batch.clone(),
        );
        let logs: BatchWriter<LogRow> = BatchWriter::spawn(
            "logs",
            Arc::new(LogSink { storage: Arc::clone(&storage) }),
            args.batch.clone(),
        );
        let writers = Writers {
            blocks: blocks.sender(),
            transactions: transactions.sender(),
            logs: logs.sender(),
        };

        let distributor = Distributor::spawn(
            args.workers,
            args.prefetch,
            Arc::clone(&queue),
            Arc::clone(storage.scanner()),
            writers,
            args.requeue_delay,
            shutdown.clone(),
        )
        .await?;

        Ok(Self {
            queue,
            storage,
            shutdown,
            running: Mutex::new(Some(Running { distributor, blocks, transactions, logs })),
            closed: AtomicBool::new(false),
        })
    }

    /// Stops the workers, flushes the writers, then closes the queue and the scanner.
    /// Idempotent.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("stopping indexer");
        self.shutdown.cancel();

        if let Some(running) = self.running.lock().await.take() {
            running.distributor.join().await;
            // workers are gone, so these are the last senders
            running.blocks.close().await;
            running.transactions.close().await;
            running.logs.close().await;
        }
        self.storage.flush_write_backs().await;

        if let Err(err) = self.queue.close().await {
            warn!(error = %err, "failed to close the queue");
        }
        self.storage.scanner().close();
        info!("indexer stopped");
    }
}
