use std::sync::Arc;

use eyre::{Result, eyre};
use store::facade::Storage;
use store::model::{BlockRow, LogRow, TransactionRow};
use sync::sink::Sink;

pub struct BlockSink {
    pub storage: Arc<Storage>,
}

#[async_trait::async_trait]
impl Sink for BlockSink {
    type Item = BlockRow;

    async fn process_batch(&self, blocks: &[BlockRow]) -> Result<()> {
        match self.storage.save_blocks(blocks).await {
            Ok(_) => {
                let nbr_of_rows = blocks.len();
                tracing::info!("Processed block batch: {nbr_of_rows:?}");
                Ok(())
            }
            Err(e) => {
                tracing::error!("Sink failed on [save_blocks]: {e:?}");
                Err(eyre!(e))
            }
        }
    }
}

pub struct TransactionSink {
    pub storage: Arc<Storage>,
}

#[async_trait::async_trait]
impl Sink for TransactionSink {
    type Item = TransactionRow;

    async fn process_batch(&self, transactions: &[TransactionRow]) -> Result<()> {
        match self.storage.save_transactions(transactions).await {
            Ok(_) => {
                let nbr_of_rows = transactions.len();
                tracing::info!("Processed transaction batch: {nbr_of_rows:?}");
                Ok(())
            }
            Err(e) => {
                tracing::error!("Sink failed on [save_transactions]: {e:?}");
                Err(eyre!(e))
            }
        }
    }
}

pub struct LogSink {
    pub storage: Arc<Storage>,
}

#[async_trait::async_trait]
impl Sink for LogSink {
    type Item = LogRow;

    async fn process_batch(&self, logs: &[LogRow]) -> Result<()> {
        match self.storage.save_logs(logs).await {
            Ok(_) => {
                let nbr_of_rows = logs.len();
                tracing::info!("Processed log batch: {nbr_of_rows:?}");
                Ok(())
            }
            Err(e) => {
                tracing::error!("Sink failed on [save_logs]: {e:?}");
                Err(eyre!(e))
            }
        }
    }
}
