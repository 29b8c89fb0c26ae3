use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{BlockRow, LogRow, TransactionRow};
use crate::tier::RowStore;

#[derive(Default)]
struct Rows {
    blocks: BTreeMap<i64, BlockRow>,
    transactions: HashMap<String, TransactionRow>,
    logs: BTreeMap<(String, i64), LogRow>,
}

/// In-process cache tier, used when no redis is configured.
#[derive(Default)]
pub struct MemoryCache {
    rows: Mutex<Rows>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> MutexGuard<'_, Rows> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RowStore for MemoryCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn block(&self, number: i64) -> Result<Option<BlockRow>, StoreError> {
        Ok(self.rows().blocks.get(&number).cloned())
    }

    async fn blocks_in_range(&self, low: i64, high: i64) -> Result<Vec<BlockRow>, StoreError> {
        if low > high {
            return Ok(Vec::new());
        }
        Ok(self.rows().blocks.range(low..=high).rev().map(|(_, row)| row.clone()).collect())
    }

    async fn transaction(&self, hash: &str) -> Result<Option<TransactionRow>, StoreError> {
        Ok(self.rows().transactions.get(hash).cloned())
    }

    async fn transactions_by_block(&self, number: i64) -> Result<Vec<TransactionRow>, StoreError> {
        let mut txs: Vec<_> = self
            .rows()
            .transactions
            .values()
            .filter(|tx| tx.block_number == number)
            .cloned()
            .collect();
        txs.sort_by(|a, b| a.hash.cmp(&b.hash));
        Ok(txs)
    }

    async fn logs(&self, tx_hash: &str) -> Result<Vec<LogRow>, StoreError> {
        let rows = self.rows();
        let from = (tx_hash.to_string(), i64::MIN);
        Ok(rows
            .logs
            .range(from..)
            .take_while(|((hash, _), _)| hash == tx_hash)
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn save_blocks(&self, rows: &[BlockRow]) -> Result<(), StoreError> {
        let mut guard = self.rows();
        for row in rows {
            guard.blocks.entry(row.number).or_insert_with(|| row.clone());
        }
        Ok(())
    }

    async fn save_transactions(&self, rows: &[TransactionRow]) -> Result<(), StoreError> {
        let mut guard = self.rows();
        for row in rows {
            guard.transactions.entry(row.hash.clone()).or_insert_with(|| row.clone());
        }
        Ok(())
    }

    async fn save_logs(&self, rows: &[LogRow]) -> Result<(), StoreError> {
        let mut guard = self.rows();
        for row in rows {
            guard.logs.entry((row.tx_hash.clone(), row.log_index)).or_insert_with(|| row.clone());
        }
        Ok(())
    }
}
