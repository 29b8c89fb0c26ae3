use std::sync::Arc;

use alloy::consensus::Transaction as _;
use alloy::eips::BlockNumberOrTag;
use alloy::primitives::B256;
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::{Block as RpcBlock, Log as RpcLog, Transaction as RpcTransaction};
use alloy::transports::http::reqwest::Url;
use alloy::transports::{RpcError, TransportErrorKind};

use crate::error::UpstreamError;
use crate::model::{Block, Log, Transaction};
use crate::upstream::{Connector, Upstream};

/// JSON-RPC client for an Ethereum node.
#[derive(Clone)]
pub struct NodeClient {
    provider: RootProvider,
}

impl NodeClient {
    pub fn new(rpc_url: Url) -> Self {
        let rpc_client = RpcClient::new_http(rpc_url);
        Self { provider: RootProvider::new(rpc_client) }
    }
}

#[async_trait::async_trait]
impl Upstream for NodeClient {
    async fn block_by_number(&self, number: u64) -> Result<Block, UpstreamError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .full()
            .await?
            .ok_or(UpstreamError::NotFound)?;
        Ok(Block::from(&block))
    }

    async fn block_by_hash(&self, hash: B256) -> Result<Block, UpstreamError> {
        let block =
            self.provider.get_block_by_hash(hash).full().await?.ok_or(UpstreamError::NotFound)?;
        Ok(Block::from(&block))
    }

    async fn transaction_by_hash(&self, hash: B256) -> Result<(Transaction, bool), UpstreamError> {
        let tx =
            self.provider.get_transaction_by_hash(hash).await?.ok_or(UpstreamError::NotFound)?;
        let tx = Transaction::from(&tx);
        let is_pending = tx.is_pending();
        Ok((tx, is_pending))
    }

    async fn transaction_logs(&self, hash: B256) -> Result<Vec<Log>, UpstreamError> {
        let receipt =
            self.provider.get_transaction_receipt(hash).await?.ok_or(UpstreamError::NotFound)?;
        Ok(receipt.inner.logs().iter().map(Log::from).collect())
    }

    async fn latest_block_number(&self) -> Result<u64, UpstreamError> {
        Ok(self.provider.get_block_number().await?)
    }
}

/// Opens a new [`NodeClient`] against the same endpoint on every call.
#[derive(Debug, Clone)]
pub struct NodeConnector {
    rpc_url: Url,
}

impl NodeConnector {
    pub fn new(rpc_url: Url) -> Self {
        Self { rpc_url }
    }
}

impl Connector for NodeConnector {
    fn connect(&self) -> Result<Arc<dyn Upstream>, UpstreamError> {
        let client: Arc<dyn Upstream> = Arc::new(NodeClient::new(self.rpc_url.clone()));
        Ok(client)
    }
}

impl From<RpcError<TransportErrorKind>> for UpstreamError {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        match err {
            // the request never got a JSON-RPC answer
            RpcError::Transport(kind) => UpstreamError::Transient(kind.to_string()),
            RpcError::NullResp => UpstreamError::NotFound,
            other => UpstreamError::from_message(other.to_string()),
        }
    }
}

impl From<&RpcBlock> for Block {
    fn from(block: &RpcBlock) -> Self {
        let header = &block.header;
        Self {
            hash: header.hash,
            number: header.number,
            gas_limit: header.gas_limit,
            gas_used: header.gas_used,
            difficulty: header.difficulty,
            timestamp: header.timestamp,
            nonce: u64::from_be_bytes(header.nonce.0),
            state_root: header.state_root,
            parent_hash: header.parent_hash,
            transactions_root: header.transactions_root,
            uncle_hash: header.ommers_hash,
            extra_data: header.extra_data.clone(),
            transactions: block.transactions.txns().map(Transaction::from).collect(),
        }
    }
}

impl From<&RpcTransaction> for Transaction {
    fn from(tx: &RpcTransaction) -> Self {
        Self {
            hash: *tx.inner.tx_hash(),
            block_number: tx.block_number,
            nonce: tx.inner.nonce(),
            from: tx.inner.signer(),
            to: tx.inner.to(),
            value: tx.inner.value(),
            input: tx.inner.input().clone(),
        }
    }
}

impl From<&RpcLog> for Log {
    fn from(log: &RpcLog) -> Self {
        Self {
            address: log.address(),
            topics: log.topics().to_vec(),
            data: log.data().data.clone(),
        }
    }
}
