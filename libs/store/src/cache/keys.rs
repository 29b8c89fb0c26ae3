//! Key layout of the cache tier. Values are the JSON encoding of the row.

pub fn block(number: i64) -> String {
    format!("BlockRow:{number}")
}

pub fn transaction(block_number: i64, hash: &str) -> String {
    format!("{block_number}:TransactionRow:{hash}")
}

/// Matches one transaction in whatever block it landed.
pub fn transaction_by_hash(hash: &str) -> String {
    format!("*:TransactionRow:{hash}")
}

pub fn transactions_by_block(block_number: i64) -> String {
    format!("{block_number}:TransactionRow:*")
}

pub fn log(tx_hash: &str, index: i64) -> String {
    format!("TxLog:{tx_hash}:{index}")
}

pub fn logs(tx_hash: &str) -> String {
    format!("TxLog:{tx_hash}:*")
}
