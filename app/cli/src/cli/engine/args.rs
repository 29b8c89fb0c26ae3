use std::time::Duration;

use clap::Args;
use engine::args::{IndexerArgs, ProducerArgs};
use sync::batch::BatchOptions;

use crate::cli::connect::{ConnectionArgs, QueueArgs};

#[derive(Args, Debug, Clone)]
pub struct IndexerOpts {
    /// Scan workers running in parallel
    #[arg(long, env = "WORKER_NUMBER", default_value_t = 4)]
    pub workers: usize,

    /// Rows buffered per table before a flush
    #[arg(long, env = "STORE_BUFFER_SIZE", default_value_t = 100)]
    pub store_buffer_size: usize,

    /// Longest wait before buffered rows are flushed, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    pub store_interval_ms: u64,

    /// Unacknowledged job messages held at once
    #[arg(long, default_value_t = 1)]
    pub prefetch: usize,

    /// Pause before a failed job is requeued, in milliseconds
    #[arg(long, default_value_t = 1_000)]
    pub requeue_delay_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ProducerOpts {
    /// Chain height poll interval in milliseconds
    #[arg(long, default_value_t = 5_000)]
    pub poll_interval_ms: u64,

    /// Raise the stored cursor to this block when it is lower
    #[arg(long)]
    pub start_block: Option<u64>,

    /// Pause before a completion notice is retried after a failed cursor write, in milliseconds
    #[arg(long, default_value_t = 1_000)]
    pub cursor_retry_ms: u64,
}

#[derive(Args, Debug)]
#[command(about = "Start the block indexer", long_about = None)]
pub struct IndexerCmd {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub queue: QueueArgs,

    #[command(flatten)]
    pub indexer: IndexerOpts,
}

#[derive(Args, Debug)]
#[command(about = "Start the block producer", long_about = None)]
pub struct ProducerCmd {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub queue: QueueArgs,

    #[command(flatten)]
    pub producer: ProducerOpts,
}

#[derive(Args, Debug)]
#[command(about = "Start producer and indexer in one process", long_about = None)]
pub struct RunCmd {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub queue: QueueArgs,

    #[command(flatten)]
    pub indexer: IndexerOpts,

    #[command(flatten)]
    pub producer: ProducerOpts,
}

impl From<&IndexerOpts> for IndexerArgs {
    fn from(opts: &IndexerOpts) -> Self {
        Self {
            workers: opts.workers,
            prefetch: opts.prefetch,
            batch: BatchOptions {
                buffer_size: opts.store_buffer_size,
                flush_interval: Duration::from_millis(opts.store_interval_ms),
            },
            requeue_delay: Duration::from_millis(opts.requeue_delay_ms),
        }
    }
}

impl From<&ProducerOpts> for ProducerArgs {
    fn from(opts: &ProducerOpts) -> Self {
        Self {
            poll_interval: Duration::from_millis(opts.poll_interval_ms),
            start_block: opts.start_block,
            requeue_delay: Duration::from_millis(opts.cursor_retry_ms),
            ..Default::default()
        }
    }
}
