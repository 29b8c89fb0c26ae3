use engine::args::{IndexerArgs, ProducerArgs};
use engine::engine::Indexer;
use engine::tracker::Tracker;
use eyre::Result;
use tokio_util::sync::CancellationToken;

use crate::cli::engine::args::{IndexerCmd, ProducerCmd, RunCmd};

pub async fn indexer(cmd: &IndexerCmd) -> Result<()> {
    let storage = cmd.connection.storage().await?;
    let queue = cmd.queue.queue().await?;
    let args = IndexerArgs::from(&cmd.indexer);

    tracing::info!(workers = args.workers, "Starting the indexer");
    let indexer = Indexer::start(&args, storage, queue, CancellationToken::new()).await?;

    // Wait for user to request shutdown (SIGINT)
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down indexer...");

    indexer.shutdown().await;
    Ok(())
}

pub async fn producer(cmd: &ProducerCmd) -> Result<()> {
    let storage = cmd.connection.storage().await?;
    let queue = cmd.queue.queue().await?;
    let args = ProducerArgs::from(&cmd.producer);

    tracing::info!(start_block = ?args.start_block, "Starting the producer");
    let tracker = Tracker::start(&args, storage, queue, CancellationToken::new()).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down producer...");

    tracker.shutdown().await;
    Ok(())
}

pub async fn both(cmd: &RunCmd) -> Result<()> {
    let storage = cmd.connection.storage().await?;
    let queue = cmd.queue.queue().await?;
    let shutdown = CancellationToken::new();

    let tracker = Tracker::start(
        &ProducerArgs::from(&cmd.producer),
        storage.clone(),
        queue.clone(),
        shutdown.clone(),
    )
    .await?;
    let indexer =
        Indexer::start(&IndexerArgs::from(&cmd.indexer), storage, queue, shutdown.clone()).await;
    let indexer = match indexer {
        Ok(indexer) => indexer,
        Err(err) => {
            tracker.shutdown().await;
            return Err(err);
        }
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    // rows first, then the cursor
    indexer.shutdown().await;
    tracker.shutdown().await;
    Ok(())
}
