use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use crate::client::Client;
use crate::error::StoreError;
use crate::model::{BlockRow, LogRow, TransactionRow};
use crate::tier::{CursorStore, RowStore};

/// Rows per INSERT statement, kept well under SQLite's bound-parameter limit.
const INSERT_CHUNK: usize = 256;

const BLOCK_COLUMNS: &str = "number, hash, gas_limit, gas_used, difficulty, timestamp, nonce, \
     state_root, parent_hash, transactions_root, uncle_hash, extra_data";
const TRANSACTION_COLUMNS: &str =
    "hash, block_number, nonce, from_address, to_address, value, input";
const LOG_COLUMNS: &str = "tx_hash, log_index, data";

/// Durable tier on SQLite.
#[derive(Clone)]
pub struct SqlStore {
    client: Client,
}

impl SqlStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl RowStore for SqlStore {
    fn name(&self) -> &'static str {
        "sql"
    }

    // ---------------------------
    // BLOCKS
    // ---------------------------

    async fn block(&self, number: i64) -> Result<Option<BlockRow>, StoreError> {
        let query = format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE number = ?");
        let block =
            sqlx::query_as(&query).bind(number).fetch_optional(self.client.pool()).await?;

        Ok(block)
    }

    async fn blocks_in_range(&self, low: i64, high: i64) -> Result<Vec<BlockRow>, StoreError> {
        let query = format!(
            "SELECT {BLOCK_COLUMNS} FROM blocks WHERE number BETWEEN ? AND ? ORDER BY number DESC"
        );
        let blocks =
            sqlx::query_as(&query).bind(low).bind(high).fetch_all(self.client.pool()).await?;

        Ok(blocks)
    }

    async fn save_blocks(&self, rows: &[BlockRow]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self.client.pool().begin().await?;
        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new(format!("INSERT OR IGNORE INTO blocks ({BLOCK_COLUMNS}) "));
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(row.number)
                    .push_bind(row.hash.clone())
                    .push_bind(row.gas_limit)
                    .push_bind(row.gas_used)
                    .push_bind(row.difficulty.clone())
                    .push_bind(row.timestamp)
                    .push_bind(row.nonce.clone())
                    .push_bind(row.state_root.clone())
                    .push_bind(row.parent_hash.clone())
                    .push_bind(row.transactions_root.clone())
                    .push_bind(row.uncle_hash.clone())
                    .push_bind(row.extra_data.clone());
            });
            builder.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!(rows = rows.len(), "saved blocks");
        Ok(())
    }

    // ---------------------------
    // TRANSACTIONS
    // ---------------------------

    async fn transaction(&self, hash: &str) -> Result<Option<TransactionRow>, StoreError> {
        let query = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE hash = ?");
        let tx = sqlx::query_as(&query).bind(hash).fetch_optional(self.client.pool()).await?;

        Ok(tx)
    }

    async fn transactions_by_block(&self, number: i64) -> Result<Vec<TransactionRow>, StoreError> {
        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE block_number = ? ORDER BY hash"
        );
        let txs = sqlx::query_as(&query).bind(number).fetch_all(self.client.pool()).await?;

        Ok(txs)
    }

    async fn save_transactions(&self, rows: &[TransactionRow]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self.client.pool().begin().await?;
        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "INSERT OR IGNORE INTO transactions ({TRANSACTION_COLUMNS}) "
            ));
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(row.hash.clone())
                    .push_bind(row.block_number)
                    .push_bind(row.nonce)
                    .push_bind(row.from_address.clone())
                    .push_bind(row.to_address.clone())
                    .push_bind(row.value.clone())
                    .push_bind(row.input.clone());
            });
            builder.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!(rows = rows.len(), "saved transactions");
        Ok(())
    }

    // ---------------------------
    // LOGS
    // ---------------------------

    async fn logs(&self, tx_hash: &str) -> Result<Vec<LogRow>, StoreError> {
        let query =
            format!("SELECT {LOG_COLUMNS} FROM logs WHERE tx_hash = ? ORDER BY log_index ASC");
        let logs = sqlx::query_as(&query).bind(tx_hash).fetch_all(self.client.pool()).await?;

        Ok(logs)
    }

    async fn save_logs(&self, rows: &[LogRow]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self.client.pool().begin().await?;
        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new(format!("INSERT OR IGNORE INTO logs ({LOG_COLUMNS}) "));
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(row.tx_hash.clone())
                    .push_bind(row.log_index)
                    .push_bind(row.data.clone());
            });
            builder.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!(rows = rows.len(), "saved logs");
        Ok(())
    }
}

#[async_trait]
impl CursorStore for SqlStore {
    async fn latest_block_number(&self) -> Result<i64, StoreError> {
        let query = r#"
            SELECT block_number
            FROM latest_block_number
            WHERE id = 0
            "#;
        let number: Option<i64> =
            sqlx::query_scalar(query).fetch_optional(self.client.pool()).await?;

        Ok(number.unwrap_or_default())
    }

    async fn update_latest_block_number(&self, number: i64) -> Result<(), StoreError> {
        let query = r#"
            UPDATE latest_block_number
            SET block_number = ?
            WHERE id = 0 AND block_number <= ?
            "#;
        sqlx::query(query).bind(number).bind(number).execute(self.client.pool()).await?;

        debug!(number, "updated latest block number");
        Ok(())
    }
}
