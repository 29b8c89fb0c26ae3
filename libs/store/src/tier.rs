use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{BlockRow, LogRow, TransactionRow};

/// A place rows can be read from and written to: the SQL store or a cache.
///
/// Writes are insert-or-ignore on each row's unique key. Reads return `None` or an empty list
/// on a miss.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Short tier name for logs.
    fn name(&self) -> &'static str;

    async fn block(&self, number: i64) -> Result<Option<BlockRow>, StoreError>;

    /// Stored blocks in `[low, high]`, highest number first. Missing numbers are skipped.
    async fn blocks_in_range(&self, low: i64, high: i64) -> Result<Vec<BlockRow>, StoreError>;

    async fn transaction(&self, hash: &str) -> Result<Option<TransactionRow>, StoreError>;

    async fn transactions_by_block(&self, number: i64) -> Result<Vec<TransactionRow>, StoreError>;

    /// Logs of one transaction ordered by index.
    async fn logs(&self, tx_hash: &str) -> Result<Vec<LogRow>, StoreError>;

    async fn save_blocks(&self, rows: &[BlockRow]) -> Result<(), StoreError>;

    async fn save_transactions(&self, rows: &[TransactionRow]) -> Result<(), StoreError>;

    async fn save_logs(&self, rows: &[LogRow]) -> Result<(), StoreError>;
}

/// The persisted ingestion cursor.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn latest_block_number(&self) -> Result<i64, StoreError>;

    /// Raises the cursor to `number`; a lower value leaves it untouched.
    async fn update_latest_block_number(&self, number: i64) -> Result<(), StoreError>;
}
