use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::sink::Sink;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Rows that trigger a flush.
    pub buffer_size: usize,
    /// Longest time a row waits in the buffer.
    pub flush_interval: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self { buffer_size: 100, flush_interval: Duration::from_secs(10) }
    }
}

/// Buffers rows of one type and hands them to a [`Sink`] in batches.
///
/// A batch goes out when `buffer_size` rows are buffered or when the flush timer fires with a
/// non-empty buffer. When every sender is gone the remaining rows are flushed and the task
/// ends. A failed batch is logged and discarded.
pub struct BatchWriter<T> {
    name: &'static str,
    tx: mpsc::UnboundedSender<T>,
    handle: JoinHandle<()>,
}

impl<T: Send + Sync + 'static> BatchWriter<T> {
    pub fn spawn(name: &'static str, sink: Arc<dyn Sink<Item = T>>, options: BatchOptions) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(name, sink, options, rx));
        info!(writer = name, "batch writer started");
        Self { name, tx, handle }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<T> {
        self.tx.clone()
    }

    /// Drops this writer's input and waits for the final flush. Rows still arrive through
    /// clones from [`sender`](Self::sender) until those are dropped too.
    pub async fn close(self) {
        let Self { name, tx, handle } = self;
        drop(tx);
        if let Err(err) = handle.await {
            error!(writer = name, error = %err, "batch writer task failed");
        }
    }
}

async fn run<T: Send + Sync>(
    name: &'static str,
    sink: Arc<dyn Sink<Item = T>>,
    options: BatchOptions,
    mut rx: mpsc::UnboundedReceiver<T>,
) {
    let buffer_size = options.buffer_size.max(1);
    let period = options.flush_interval.max(Duration::from_millis(1));
    let mut buffer = Vec::with_capacity(buffer_size);

    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            row = rx.recv() => match row {
                Some(row) => {
                    buffer.push(row);
                    if buffer.len() >= buffer_size {
                        flush(name, sink.as_ref(), &mut buffer).await;
                    }
                }
                None => {
                    if !buffer.is_empty() {
                        flush(name, sink.as_ref(), &mut buffer).await;
                    }
                    break;
                }
            },
            _ = ticker.tick() => {
                if !buffer.is_empty() {
                    flush(name, sink.as_ref(), &mut buffer).await;
                }
            }
        }
    }

    info!(writer = name, "batch writer stopped");
}

async fn flush<T: Send + Sync>(name: &'static str, sink: &dyn Sink<Item = T>, buffer: &mut Vec<T>) {
    match sink.process_batch(&buffer[..]).await {
        Ok(()) => debug!(writer = name, rows = buffer.len(), "flushed batch"),
        Err(err) => error!(writer = name, rows = buffer.len(), error = ?err, "dropping failed batch"),
    }
    buffer.clear();
}
