use std::sync::Arc;

use alloy::primitives::B256;

use crate::error::UpstreamError;
use crate::model::{Block, Log, Transaction};

/// The calls the ingestion pipeline needs from a chain node.
#[async_trait::async_trait]
pub trait Upstream: Send + Sync {
    async fn block_by_number(&self, number: u64) -> Result<Block, UpstreamError>;

    async fn block_by_hash(&self, hash: B256) -> Result<Block, UpstreamError>;

    /// Returns the transaction and whether it is still pending.
    async fn transaction_by_hash(&self, hash: B256) -> Result<(Transaction, bool), UpstreamError>;

    /// Logs from the transaction receipt.
    async fn transaction_logs(&self, hash: B256) -> Result<Vec<Log>, UpstreamError>;

    async fn latest_block_number(&self) -> Result<u64, UpstreamError>;
}

/// Builds upstream clients. The scanner asks for a fresh one after a transient fault.
pub trait Connector: Send + Sync {
    fn connect(&self) -> Result<Arc<dyn Upstream>, UpstreamError>;
}
