#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use chain::error::UpstreamError;
use chain::model::{Block, Log, Transaction};
use chain::scanner::{Scanner, ScannerOptions};
use chain::upstream::{Connector, Upstream};
use eyre::{Result, eyre};
use store::cache::memory::MemoryCache;
use store::client::Client;
use store::facade::Storage;
use store::store::SqlStore;
use store::tier::CursorStore;
use tokio::time::Instant;

pub const TXS_PER_BLOCK: u8 = 2;

/// A chain whose blocks are derived from their number.
pub struct MockChain {
    height: AtomicU64,
    failures: Mutex<HashMap<u64, u32>>,
    latency: Mutex<Duration>,
    block_calls: AtomicU64,
}

impl MockChain {
    pub fn new(height: u64) -> Arc<Self> {
        Arc::new(Self {
            height: AtomicU64::new(height),
            failures: Mutex::new(HashMap::new()),
            latency: Mutex::new(Duration::ZERO),
            block_calls: AtomicU64::new(0),
        })
    }

    /// Every block fetch takes this long.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    /// Block fetches served so far, failed ones included.
    pub fn block_calls(&self) -> u64 {
        self.block_calls.load(Ordering::SeqCst)
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    /// The next `times` fetches of block `number` fail.
    pub fn fail_block(&self, number: u64, times: u32) {
        self.failures.lock().unwrap().insert(number, times);
    }

    pub fn tx_hash(number: u64, index: u8) -> B256 {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&number.to_be_bytes());
        bytes[31] = index + 1;
        B256::from(bytes)
    }

    fn number_of(hash: B256) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash[..8]);
        u64::from_be_bytes(bytes)
    }

    pub fn block(number: u64) -> Block {
        let transactions = (0..TXS_PER_BLOCK)
            .map(|index| Transaction {
                hash: Self::tx_hash(number, index),
                block_number: Some(number),
                nonce: u64::from(index),
                from: Address::repeat_byte(0xaa),
                to: (index == 0).then(|| Address::repeat_byte(0xbb)),
                value: U256::from(number),
                input: Bytes::from(vec![index]),
            })
            .collect();
        Block {
            hash: B256::left_padding_from(&number.to_be_bytes()),
            number,
            parent_hash: B256::left_padding_from(&number.saturating_sub(1).to_be_bytes()),
            timestamp: 1_700_000_000 + number * 12,
            gas_limit: 30_000_000,
            transactions,
            ..Default::default()
        }
    }

    fn height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Upstream for MockChain {
    async fn block_by_number(&self, number: u64) -> Result<Block, UpstreamError> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if number > self.height() {
            return Err(UpstreamError::NotFound);
        }
        if let Some(left) = self.failures.lock().unwrap().get_mut(&number) {
            if *left > 0 {
                *left -= 1;
                return Err(UpstreamError::Permanent("header not available".to_string()));
            }
        }
        Ok(Self::block(number))
    }

    async fn block_by_hash(&self, hash: B256) -> Result<Block, UpstreamError> {
        let number = u64::from_be_bytes(hash[24..].try_into().unwrap());
        self.block_by_number(number).await
    }

    async fn transaction_by_hash(&self, hash: B256) -> Result<(Transaction, bool), UpstreamError> {
        let number = Self::number_of(hash);
        let block = self.block_by_number(number).await?;
        let tx = block.transactions.into_iter().find(|tx| tx.hash == hash);
        tx.map(|tx| (tx, false)).ok_or(UpstreamError::NotFound)
    }

    async fn transaction_logs(&self, hash: B256) -> Result<Vec<Log>, UpstreamError> {
        Ok(vec![Log { data: Bytes::copy_from_slice(hash.as_slice()), ..Default::default() }])
    }

    async fn latest_block_number(&self) -> Result<u64, UpstreamError> {
        Ok(self.height())
    }
}

struct MockConnector(Arc<MockChain>);

impl Connector for MockConnector {
    fn connect(&self) -> Result<Arc<dyn Upstream>, UpstreamError> {
        let node: Arc<dyn Upstream> = self.0.clone();
        Ok(node)
    }
}

pub fn scanner(chain: &Arc<MockChain>) -> Result<Arc<Scanner>> {
    let options = ScannerOptions {
        max_retry: 1,
        backoff: Duration::from_millis(1),
        log_backoff: Duration::from_millis(1),
    };
    Ok(Arc::new(Scanner::new(Arc::new(MockConnector(chain.clone())), options)?))
}

/// Storage over an in-memory SQLite database and an in-memory cache. The SQL store is returned
/// too so tests can look at the durable tier directly.
pub async fn storage(chain: &Arc<MockChain>) -> Result<(Arc<Storage>, SqlStore)> {
    let sql = SqlStore::new(Client::init("sqlite::memory:").await?);
    let storage = Storage::with_sql(sql.clone(), Arc::new(MemoryCache::new()), scanner(chain)?);
    Ok((Arc::new(storage), sql))
}

/// Storage whose cursor store is `cursor` instead of the SQL store.
pub async fn storage_with_cursor(
    chain: &Arc<MockChain>,
    cursor: Arc<dyn CursorStore>,
) -> Result<(Arc<Storage>, SqlStore)> {
    let sql = SqlStore::new(Client::init("sqlite::memory:").await?);
    let storage =
        Storage::new(Arc::new(MemoryCache::new()), Arc::new(sql.clone()), cursor, scanner(chain)?);
    Ok((Arc::new(storage), sql))
}

/// Polls `check` until it holds, for up to ten seconds.
pub async fn wait_until<F, Fut>(what: &str, mut check: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if check().await? {
            return Ok(());
        }
        if Instant::now() > deadline {
            return Err(eyre!("timed out waiting for {what}"));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
