use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Block header fields as stored. Hashes are `0x` hex, `difficulty` is decimal.
#[derive(Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct BlockRow {
    pub number: i64,
    pub hash: String,
    pub gas_limit: i64,
    pub gas_used: i64,
    pub difficulty: String,
    pub timestamp: i64,
    /// 8-byte seal nonce, `0x` hex.
    pub nonce: String,
    pub state_root: String,
    pub parent_hash: String,
    pub transactions_root: String,
    pub uncle_hash: String,
    #[serde(with = "hex")]
    pub extra_data: Vec<u8>,
}

#[derive(Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct TransactionRow {
    pub hash: String,
    pub block_number: i64,
    pub nonce: i64,
    pub from_address: String,
    /// Empty for contract creation.
    pub to_address: String,
    /// Wei, decimal.
    pub value: String,
    #[serde(with = "hex")]
    pub input: Vec<u8>,
}

#[derive(Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LogRow {
    pub tx_hash: String,
    /// Position within the transaction receipt.
    pub log_index: i64,
    #[serde(with = "hex")]
    pub data: Vec<u8>,
}
