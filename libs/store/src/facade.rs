use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::B256;
use async_trait::async_trait;
use chain::model::Block;
use chain::scanner::Scanner;
use futures_util::{StreamExt, TryStreamExt, stream};
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::adapter;
use crate::error::{StorageError, StoreError};
use crate::model::{BlockRow, LogRow, TransactionRow};
use crate::store::SqlStore;
use crate::tier::{CursorStore, RowStore};
use crate::utils;

/// Widest block range a single read may ask for.
pub const MAX_BLOCK_RANGE: u64 = 1000;

/// Upstream block requests in flight at once while filling a range.
pub const RANGE_FETCH_CONCURRENCY: usize = 16;

/// One kind of read, the same against every tier.
#[async_trait]
trait Lookup: Clone + Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    const OP: &'static str;

    async fn read(&self, tier: &dyn RowStore) -> Result<Option<Self::Output>, StoreError>;

    async fn save(&self, tier: &dyn RowStore, value: &Self::Output) -> Result<(), StoreError>;

    fn is_hit(&self, _value: &Self::Output) -> bool {
        true
    }
}

#[derive(Clone)]
struct BlockByNumber(i64);

#[async_trait]
impl Lookup for BlockByNumber {
    type Output = BlockRow;

    const OP: &'static str = "block_by_number";

    async fn read(&self, tier: &dyn RowStore) -> Result<Option<BlockRow>, StoreError> {
        tier.block(self.0).await
    }

    async fn save(&self, tier: &dyn RowStore, value: &BlockRow) -> Result<(), StoreError> {
        tier.save_blocks(std::slice::from_ref(value)).await
    }
}

#[derive(Clone)]
struct BlockRange {
    low: i64,
    high: i64,
}

#[async_trait]
impl Lookup for BlockRange {
    type Output = Vec<BlockRow>;

    const OP: &'static str = "list_blocks_in_range";

    async fn read(&self, tier: &dyn RowStore) -> Result<Option<Vec<BlockRow>>, StoreError> {
        tier.blocks_in_range(self.low, self.high).await.map(Some)
    }

    async fn save(&self, tier: &dyn RowStore, value: &Vec<BlockRow>) -> Result<(), StoreError> {
        tier.save_blocks(value).await
    }

    // a partial range is a miss
    fn is_hit(&self, value: &Vec<BlockRow>) -> bool {
        value.len() as u128 == self.high.abs_diff(self.low) as u128 + 1
    }
}

#[derive(Clone)]
struct TransactionByHash(String);

#[async_trait]
impl Lookup for TransactionByHash {
    type Output = TransactionRow;

    const OP: &'static str = "transaction_by_hash";

    async fn read(&self, tier: &dyn RowStore) -> Result<Option<TransactionRow>, StoreError> {
        tier.transaction(&self.0).await
    }

    async fn save(&self, tier: &dyn RowStore, value: &TransactionRow) -> Result<(), StoreError> {
        tier.save_transactions(std::slice::from_ref(value)).await
    }
}

#[derive(Clone)]
struct TransactionsByBlock(i64);

#[async_trait]
impl Lookup for TransactionsByBlock {
    type Output = Vec<TransactionRow>;

    const OP: &'static str = "transactions_by_block";

    async fn read(&self, tier: &dyn RowStore) -> Result<Option<Vec<TransactionRow>>, StoreError> {
        tier.transactions_by_block(self.0).await.map(Some)
    }

    async fn save(
        &self,
        tier: &dyn RowStore,
        value: &Vec<TransactionRow>,
    ) -> Result<(), StoreError> {
        tier.save_transactions(value).await
    }

    // an empty block and a block nobody stored look the same, so only the node can tell
    fn is_hit(&self, value: &Vec<TransactionRow>) -> bool {
        !value.is_empty()
    }
}

#[derive(Clone)]
struct LogsByTransaction(String);

#[async_trait]
impl Lookup for LogsByTransaction {
    type Output = Vec<LogRow>;

    const OP: &'static str = "logs_by_transaction";

    async fn read(&self, tier: &dyn RowStore) -> Result<Option<Vec<LogRow>>, StoreError> {
        tier.logs(&self.0).await.map(Some)
    }

    async fn save(&self, tier: &dyn RowStore, value: &Vec<LogRow>) -> Result<(), StoreError> {
        tier.save_logs(value).await
    }

    // no rows is ambiguous between "no logs" and "not stored"; the receipt settles it
    fn is_hit(&self, value: &Vec<LogRow>) -> bool {
        !value.is_empty()
    }
}

/// Read and write entry point over the cache, the durable store and the upstream node.
///
/// Reads try the cache, then the durable store, then the upstream scanner. A durable hit is
/// copied into the cache and an upstream hit into both, in the background. Writes go to the
/// durable store only.
pub struct Storage {
    cache: Arc<dyn RowStore>,
    durable: Arc<dyn RowStore>,
    cursor: Arc<dyn CursorStore>,
    scanner: Arc<Scanner>,
    write_backs: TaskTracker,
    write_back_failures: Arc<AtomicU64>,
}

impl Storage {
    pub fn new(
        cache: Arc<dyn RowStore>,
        durable: Arc<dyn RowStore>,
        cursor: Arc<dyn CursorStore>,
        scanner: Arc<Scanner>,
    ) -> Self {
        Self {
            cache,
            durable,
            cursor,
            scanner,
            write_backs: TaskTracker::new(),
            write_back_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The SQL store serves as both durable tier and cursor.
    pub fn with_sql(sql: SqlStore, cache: Arc<dyn RowStore>, scanner: Arc<Scanner>) -> Self {
        let sql = Arc::new(sql);
        Self::new(cache, sql.clone(), sql, scanner)
    }

    pub fn scanner(&self) -> &Arc<Scanner> {
        &self.scanner
    }

    // ---------------------------
    // WRITES
    // ---------------------------

    pub async fn save_blocks(&self, rows: &[BlockRow]) -> Result<(), StorageError> {
        self.durable
            .save_blocks(rows)
            .await
            .map_err(|source| StorageError::Store { op: "save_blocks", source })
    }

    pub async fn save_transactions(&self, rows: &[TransactionRow]) -> Result<(), StorageError> {
        self.durable
            .save_transactions(rows)
            .await
            .map_err(|source| StorageError::Store { op: "save_transactions", source })
    }

    pub async fn save_logs(&self, rows: &[LogRow]) -> Result<(), StorageError> {
        self.durable
            .save_logs(rows)
            .await
            .map_err(|source| StorageError::Store { op: "save_logs", source })
    }

    // ---------------------------
    // CURSOR
    // ---------------------------

    pub async fn latest_block_number(&self) -> Result<u64, StorageError> {
        let op = "latest_block_number";
        let number = self
            .cursor
            .latest_block_number()
            .await
            .map_err(|source| StorageError::Store { op, source })?;
        Ok(u64::try_from(number).unwrap_or_default())
    }

    pub async fn update_latest_block_number(&self, number: u64) -> Result<(), StorageError> {
        let op = "update_latest_block_number";
        let number = i64::try_from(number)
            .map_err(|_| StorageError::InvalidKey { op, key: number.to_string() })?;
        self.cursor
            .update_latest_block_number(number)
            .await
            .map_err(|source| StorageError::Store { op, source })
    }

    // ---------------------------
    // READS
    // ---------------------------

    pub async fn block(&self, number: u64) -> Result<BlockRow, StorageError> {
        let lookup = BlockByNumber(Self::key(BlockByNumber::OP, number)?);
        if let Some(block) = self.from_stores(&lookup).await {
            return Ok(block);
        }

        let block = self
            .scanner
            .block_by_number(number)
            .await
            .map_err(|err| StorageError::upstream(BlockByNumber::OP, err))?;
        let row = BlockRow::try_from(&block)
            .map_err(|source| StorageError::Convert { op: BlockByNumber::OP, source })?;
        self.write_back(&lookup, vec![self.durable.clone(), self.cache.clone()], row.clone());
        Ok(row)
    }

    /// Transactions of a block, ordered by hash.
    pub async fn transactions_by_block(
        &self,
        number: u64,
    ) -> Result<Vec<TransactionRow>, StorageError> {
        let op = TransactionsByBlock::OP;
        let lookup = TransactionsByBlock(Self::key(op, number)?);
        if let Some(txs) = self.from_stores(&lookup).await {
            return Ok(txs);
        }

        let block = self
            .scanner
            .block_by_number(number)
            .await
            .map_err(|err| StorageError::upstream(op, err))?;
        let mut rows = block
            .transactions
            .iter()
            .map(TransactionRow::try_from)
            .collect::<eyre::Result<Vec<_>>>()
            .map_err(|source| StorageError::Convert { op, source })?;
        rows.sort_by(|a, b| a.hash.cmp(&b.hash));
        if !rows.is_empty() {
            self.write_back(&lookup, vec![self.durable.clone(), self.cache.clone()], rows.clone());
        }
        Ok(rows)
    }

    /// A mined transaction. Pending transactions are reported as not found.
    pub async fn transaction(&self, hash: &str) -> Result<TransactionRow, StorageError> {
        let op = TransactionByHash::OP;
        let parsed = Self::hash(op, hash)?;
        let lookup = TransactionByHash(parsed.to_string());
        if let Some(tx) = self.from_stores(&lookup).await {
            return Ok(tx);
        }

        let (tx, is_pending) = self
            .scanner
            .transaction_detail(parsed)
            .await
            .map_err(|err| StorageError::upstream(op, err))?;
        if is_pending {
            debug!(hash = %parsed, "transaction is pending");
            return Err(StorageError::NotFound { op });
        }
        let row =
            TransactionRow::try_from(&tx).map_err(|source| StorageError::Convert { op, source })?;
        self.write_back(&lookup, vec![self.durable.clone(), self.cache.clone()], row.clone());
        Ok(row)
    }

    /// Receipt logs of a transaction, ordered by index. Empty for a transaction without logs.
    pub async fn logs(&self, tx_hash: &str) -> Result<Vec<LogRow>, StorageError> {
        let op = LogsByTransaction::OP;
        let parsed = Self::hash(op, tx_hash)?;
        let lookup = LogsByTransaction(parsed.to_string());
        if let Some(logs) = self.from_stores(&lookup).await {
            return Ok(logs);
        }

        let logs = self
            .scanner
            .logs_for_transaction(parsed)
            .await
            .map_err(|err| StorageError::upstream(op, err))?;
        let rows = adapter::log_rows(parsed, &logs);
        if !rows.is_empty() {
            self.write_back(&lookup, vec![self.durable.clone(), self.cache.clone()], rows.clone());
        }
        Ok(rows)
    }

    /// Blocks in `[low, high]`, highest number first. Every number in the range is present.
    /// Ranges wider than [`MAX_BLOCK_RANGE`] are rejected.
    pub async fn list_blocks_in_range(
        &self,
        low: u64,
        high: u64,
    ) -> Result<Vec<BlockRow>, StorageError> {
        let op = BlockRange::OP;
        if low > high {
            return Ok(Vec::new());
        }
        if high - low >= MAX_BLOCK_RANGE {
            return Err(StorageError::InvalidKey { op, key: format!("{low}..={high}") });
        }
        let lookup = BlockRange { low: Self::key(op, low)?, high: Self::key(op, high)? };
        if let Some(blocks) = self.from_stores(&lookup).await {
            return Ok(blocks);
        }

        let blocks: Vec<Block> = stream::iter((low..=high).rev())
            .map(|number| self.scanner.block_by_number(number))
            .buffered(RANGE_FETCH_CONCURRENCY)
            .try_collect()
            .await
            .map_err(|err| StorageError::upstream(op, err))?;
        let rows = blocks
            .iter()
            .map(BlockRow::try_from)
            .collect::<eyre::Result<Vec<_>>>()
            .map_err(|source| StorageError::Convert { op, source })?;
        self.write_back(&lookup, vec![self.durable.clone(), self.cache.clone()], rows.clone());
        Ok(rows)
    }

    /// The `count` most recent blocks of the chain, highest first.
    pub async fn recent_blocks(&self, count: u64) -> Result<Vec<BlockRow>, StorageError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        if count > MAX_BLOCK_RANGE {
            return Err(StorageError::InvalidKey { op: "recent_blocks", key: count.to_string() });
        }
        let height = self
            .scanner
            .latest_block_number()
            .await
            .map_err(|err| StorageError::upstream("recent_blocks", err))?;
        let low = height.saturating_sub(count - 1);
        self.list_blocks_in_range(low, height).await
    }

    // ---------------------------
    // WRITE-BACKS
    // ---------------------------

    pub fn write_back_failures(&self) -> u64 {
        self.write_back_failures.load(Ordering::Relaxed)
    }

    /// Waits for every write-back spawned so far.
    pub async fn flush_write_backs(&self) {
        self.write_backs.close();
        self.write_backs.wait().await;
        self.write_backs.reopen();
    }

    async fn from_stores<L: Lookup>(&self, lookup: &L) -> Option<L::Output> {
        match lookup.read(self.cache.as_ref()).await {
            Ok(Some(value)) if lookup.is_hit(&value) => return Some(value),
            Ok(_) => {}
            Err(err) => warn!(op = L::OP, tier = self.cache.name(), error = %err, "read failed"),
        }

        match lookup.read(self.durable.as_ref()).await {
            Ok(Some(value)) if lookup.is_hit(&value) => {
                self.write_back(lookup, vec![self.cache.clone()], value.clone());
                Some(value)
            }
            Ok(_) => None,
            Err(err) => {
                warn!(op = L::OP, tier = self.durable.name(), error = %err, "read failed");
                None
            }
        }
    }

    fn write_back<L: Lookup>(&self, lookup: &L, tiers: Vec<Arc<dyn RowStore>>, value: L::Output) {
        let lookup = lookup.clone();
        let failures = Arc::clone(&self.write_back_failures);
        self.write_backs.spawn(async move {
            for tier in tiers {
                if let Err(err) = lookup.save(tier.as_ref(), &value).await {
                    failures.fetch_add(1, Ordering::Relaxed);
                    warn!(op = L::OP, tier = tier.name(), error = %err, "write-back failed");
                }
            }
        });
    }

    fn key(op: &'static str, number: u64) -> Result<i64, StorageError> {
        i64::try_from(number).map_err(|_| StorageError::InvalidKey { op, key: number.to_string() })
    }

    fn hash(op: &'static str, hash: &str) -> Result<B256, StorageError> {
        B256::from_str(&utils::normalize_hex(hash))
            .map_err(|_| StorageError::InvalidKey { op, key: hash.to_string() })
    }
}
