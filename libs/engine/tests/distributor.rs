mod common;

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use engine::distributor::{Distributor, Writers};
    use eyre::Result;
    use queue::{DONE_QUEUE, JOB_QUEUE, MemoryQueue, MessageQueue};
    use store::tier::RowStore;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::common::{self, MockChain, TXS_PER_BLOCK};

    struct Channels {
        writers: Writers,
        blocks: mpsc::UnboundedReceiver<store::model::BlockRow>,
        transactions: mpsc::UnboundedReceiver<store::model::TransactionRow>,
        logs: mpsc::UnboundedReceiver<store::model::LogRow>,
    }

    fn channels() -> Channels {
        let (blocks_tx, blocks) = mpsc::unbounded_channel();
        let (transactions_tx, transactions) = mpsc::unbounded_channel();
        let (logs_tx, logs) = mpsc::unbounded_channel();
        let writers = Writers { blocks: blocks_tx, transactions: transactions_tx, logs: logs_tx };
        Channels { writers, blocks, transactions, logs }
    }

    #[tokio::test]
    async fn test_scanned_job_is_acked_and_announced() -> Result<()> {
        let chain = MockChain::new(10);
        let queue = Arc::new(MemoryQueue::new());
        let mut ch = channels();
        let shutdown = CancellationToken::new();

        queue.publish(JOB_QUEUE, "7").await?;
        let distributor = Distributor::spawn(
            2,
            1,
            queue.clone(),
            common::scanner(&chain)?,
            ch.writers.clone(),
            Duration::from_millis(10),
            shutdown.clone(),
        )
        .await?;

        let q = &queue;
        common::wait_until("settled job", || async move {
            let announced = q.peek(DONE_QUEUE) == vec!["7".to_string()];
            Ok(announced && q.ready(JOB_QUEUE) + q.unacked(JOB_QUEUE) == 0)
        })
        .await?;

        assert_eq!(ch.blocks.try_recv()?.number, 7);
        for _ in 0..TXS_PER_BLOCK {
            let tx = ch.transactions.try_recv()?;
            assert_eq!(tx.block_number, 7);
            let log = ch.logs.try_recv()?;
            assert_eq!((log.tx_hash, log.log_index), (tx.hash, 0));
        }

        shutdown.cancel();
        distributor.join().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_job_is_dropped() -> Result<()> {
        let chain = MockChain::new(10);
        let queue = Arc::new(MemoryQueue::new());
        let ch = channels();
        let shutdown = CancellationToken::new();

        queue.publish(JOB_QUEUE, "0x10").await?;
        queue.publish(JOB_QUEUE, "3").await?;
        let distributor = Distributor::spawn(
            1,
            1,
            queue.clone(),
            common::scanner(&chain)?,
            ch.writers.clone(),
            Duration::from_millis(10),
            shutdown.clone(),
        )
        .await?;

        let q = &queue;
        common::wait_until("settled job", || async move {
            let announced = q.peek(DONE_QUEUE) == vec!["3".to_string()];
            Ok(announced && q.ready(JOB_QUEUE) + q.unacked(JOB_QUEUE) == 0)
        })
        .await?;

        shutdown.cancel();
        distributor.join().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_scan_is_requeued_and_retried() -> Result<()> {
        let chain = MockChain::new(10);
        chain.fail_block(9, 2);
        let queue = Arc::new(MemoryQueue::new());
        let ch = channels();
        let shutdown = CancellationToken::new();

        queue.publish(JOB_QUEUE, "9").await?;
        let distributor = Distributor::spawn(
            1,
            1,
            queue.clone(),
            common::scanner(&chain)?,
            ch.writers.clone(),
            Duration::from_millis(10),
            shutdown.clone(),
        )
        .await?;

        let q = &queue;
        common::wait_until("completion notice", || async move {
            Ok(q.peek(DONE_QUEUE) == vec!["9".to_string()])
        })
        .await?;

        shutdown.cancel();
        distributor.join().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_rows_reach_storage_through_writers() -> Result<()> {
        let chain = MockChain::new(10);
        let (storage, sql) = common::storage(&chain).await?;
        let ch = channels();

        engine::distributor::scan_block(storage.scanner(), &ch.writers, 4).await?;
        let Channels { mut blocks, .. } = ch;
        let block = blocks.try_recv()?;
        storage.save_blocks(&[block.clone()]).await?;

        assert_eq!(sql.block(4).await?, Some(block));
        Ok(())
    }

    #[tokio::test]
    async fn test_failing_block_is_requeued_with_a_pause() -> Result<()> {
        // the node never has block 104
        let chain = MockChain::new(10);
        let queue = Arc::new(MemoryQueue::new());
        let ch = channels();
        let shutdown = CancellationToken::new();

        queue.publish(JOB_QUEUE, "104").await?;
        let distributor = Distributor::spawn(
            4,
            1,
            queue.clone(),
            common::scanner(&chain)?,
            ch.writers.clone(),
            Duration::from_millis(100),
            shutdown.clone(),
        )
        .await?;

        tokio::time::sleep(Duration::from_millis(500)).await;
        shutdown.cancel();
        distributor.join().await;

        let calls = chain.block_calls();
        assert!((1..=8).contains(&calls), "{calls} upstream calls in 500ms");
        assert!(queue.peek(DONE_QUEUE).is_empty());

        let q = &queue;
        common::wait_until("job back on the queue", || async move {
            Ok(q.peek(JOB_QUEUE) == vec!["104".to_string()] && q.unacked(JOB_QUEUE) == 0)
        })
        .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_shutdown_returns_in_flight_job_to_queue() -> Result<()> {
        let chain = MockChain::new(10);
        chain.set_latency(Duration::from_secs(30));
        let queue = Arc::new(MemoryQueue::new());
        let ch = channels();
        let shutdown = CancellationToken::new();

        queue.publish(JOB_QUEUE, "5").await?;
        let distributor = Distributor::spawn(
            2,
            1,
            queue.clone(),
            common::scanner(&chain)?,
            ch.writers.clone(),
            Duration::from_millis(10),
            shutdown.clone(),
        )
        .await?;

        let c = &chain;
        common::wait_until("scan in progress", || async move { Ok(c.block_calls() == 1) })
            .await?;
        shutdown.cancel();
        distributor.join().await;

        assert_eq!(queue.unacked(JOB_QUEUE), 0);
        assert_eq!(queue.peek(JOB_QUEUE), vec!["5".to_string()]);
        assert!(queue.peek(DONE_QUEUE).is_empty());
        Ok(())
    }
}
