use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::cache::keys;
use crate::error::StoreError;
use crate::model::{BlockRow, LogRow, TransactionRow};
use crate::tier::RowStore;

/// Cache tier on redis. Entries never expire.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("connected to redis cache");
        Ok(Self { conn })
    }

    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        value.map(|value| serde_json::from_str(&value)).transpose().map_err(StoreError::from)
    }

    async fn get_many<T: DeserializeOwned>(&self, keys: &[String]) -> Result<Vec<T>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let values: Vec<Option<String>> = redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;
        values
            .into_iter()
            .flatten()
            .map(|value| serde_json::from_str(&value).map_err(StoreError::from))
            .collect()
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let mut keys = Vec::new();
        let mut iter = conn.scan_match::<_, String>(pattern).await?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }

    async fn set_all<T: Serialize>(&self, entries: &[(String, &T)]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        for (key, row) in entries {
            pipe.set(key, serde_json::to_string(row)?).ignore();
        }
        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        debug!(entries = entries.len(), "cached rows");
        Ok(())
    }
}

#[async_trait]
impl RowStore for RedisCache {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn block(&self, number: i64) -> Result<Option<BlockRow>, StoreError> {
        self.get(&keys::block(number)).await
    }

    async fn blocks_in_range(&self, low: i64, high: i64) -> Result<Vec<BlockRow>, StoreError> {
        if low > high {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = (low..=high).rev().map(keys::block).collect();
        self.get_many(&keys).await
    }

    async fn transaction(&self, hash: &str) -> Result<Option<TransactionRow>, StoreError> {
        let Some(key) = self.scan(&keys::transaction_by_hash(hash)).await?.into_iter().next()
        else {
            return Ok(None);
        };
        self.get(&key).await
    }

    async fn transactions_by_block(&self, number: i64) -> Result<Vec<TransactionRow>, StoreError> {
        let mut keys = self.scan(&keys::transactions_by_block(number)).await?;
        keys.sort();
        self.get_many(&keys).await
    }

    async fn logs(&self, tx_hash: &str) -> Result<Vec<LogRow>, StoreError> {
        let keys = self.scan(&keys::logs(tx_hash)).await?;
        let mut logs: Vec<LogRow> = self.get_many(&keys).await?;
        logs.sort_by_key(|log| log.log_index);
        Ok(logs)
    }

    async fn save_blocks(&self, rows: &[BlockRow]) -> Result<(), StoreError> {
        let entries: Vec<_> = rows.iter().map(|row| (keys::block(row.number), row)).collect();
        self.set_all(&entries).await
    }

    async fn save_transactions(&self, rows: &[TransactionRow]) -> Result<(), StoreError> {
        let entries: Vec<_> =
            rows.iter().map(|row| (keys::transaction(row.block_number, &row.hash), row)).collect();
        self.set_all(&entries).await
    }

    async fn save_logs(&self, rows: &[LogRow]) -> Result<(), StoreError> {
        let entries: Vec<_> =
            rows.iter().map(|row| (keys::log(&row.tx_hash, row.log_index), row)).collect();
        self.set_all(&entries).await
    }
}
