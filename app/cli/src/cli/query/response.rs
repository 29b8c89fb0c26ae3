use serde::Serialize;
use store::model::{BlockRow, LogRow, TransactionRow};
use store::utils;

#[derive(Debug, Serialize)]
pub struct TxResponse {
    pub tx_hash: String,
    pub from: String,
    pub to: String,
    pub data: String,
    pub value: String,
    pub nonce: i64,
    pub logs: Vec<LogResponse>,
}

#[derive(Debug, Serialize)]
pub struct LogResponse {
    pub index: i64,
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct BlockResponseWithTx {
    pub block_num: i64,
    pub block_hash: String,
    pub block_time: i64,
    pub parent_hash: String,
    pub transactions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BlockResponse {
    pub block_num: i64,
    pub block_hash: String,
    pub block_time: i64,
    pub parent_hash: String,
}

/// Printed instead of a response when the lookup fails.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub error: String,
}

impl TxResponse {
    pub fn new(tx: TransactionRow, logs: Vec<LogRow>) -> Self {
        Self {
            tx_hash: tx.hash,
            from: tx.from_address,
            to: tx.to_address,
            data: utils::bytes_to_hex(&tx.input),
            value: tx.value,
            nonce: tx.nonce,
            logs: logs.into_iter().map(LogResponse::from).collect(),
        }
    }
}

impl From<LogRow> for LogResponse {
    fn from(log: LogRow) -> Self {
        Self { index: log.log_index, data: utils::bytes_to_hex(&log.data) }
    }
}

impl BlockResponseWithTx {
    pub fn new(block: BlockRow, transactions: Vec<TransactionRow>) -> Self {
        Self {
            block_num: block.number,
            block_hash: block.hash,
            block_time: block.timestamp,
            parent_hash: block.parent_hash,
            transactions: transactions.into_iter().map(|tx| tx.hash).collect(),
        }
    }
}

impl From<BlockRow> for BlockResponse {
    fn from(block: BlockRow) -> Self {
        Self {
            block_num: block.number,
            block_hash: block.hash,
            block_time: block.timestamp,
            parent_hash: block.parent_hash,
        }
    }
}
