use std::sync::Arc;

use alloy::transports::http::reqwest::Url;
use chain::rpc::NodeConnector;
use chain::scanner::{Scanner, ScannerOptions};
use clap::Args;
use eyre::{Result, WrapErr};
use queue::MessageQueue;
use store::cache::memory::MemoryCache;
use store::cache::redis_store::RedisCache;
use store::client::Client;
use store::facade::Storage;
use store::store::SqlStore;
use store::tier::RowStore;

/// Where the upstream node, the database and the cache live.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Node JSON-RPC endpoint
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: String,

    /// SQLite connection string
    #[arg(long, env = "DATABASE_URL")]
    pub db_url: String,

    /// Redis cache; an in-process cache is used when absent
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Attempts per upstream call
    #[arg(long, env = "MAX_RETRY_TIME", default_value_t = 5)]
    pub max_retry: u32,
}

#[derive(Args, Debug, Clone)]
pub struct QueueArgs {
    /// Message queue: `redis://...`, or `memory://` for a single process
    #[arg(long, env = "QUEUE_URL", default_value = "memory://")]
    pub queue_url: String,
}

impl ConnectionArgs {
    pub async fn storage(&self) -> Result<Arc<Storage>> {
        let rpc_url = Url::parse(&self.rpc_url).wrap_err("invalid rpc url")?;
        let options = ScannerOptions { max_retry: self.max_retry, ..Default::default() };
        let scanner = Scanner::new(Arc::new(NodeConnector::new(rpc_url)), options)
            .wrap_err("failed to create the upstream client")?;

        let client = Client::init(&self.db_url).await.wrap_err("failed to open the database")?;

        let cache: Arc<dyn RowStore> = match &self.redis_url {
            Some(url) => Arc::new(
                RedisCache::connect(url).await.wrap_err("failed to connect to the redis cache")?,
            ),
            None => Arc::new(MemoryCache::new()),
        };

        Ok(Arc::new(Storage::with_sql(SqlStore::new(client), cache, Arc::new(scanner))))
    }
}

impl QueueArgs {
    pub async fn queue(&self) -> Result<Arc<dyn MessageQueue>> {
        queue::connect(&self.queue_url).await.wrap_err("failed to connect to the message queue")
    }
}
