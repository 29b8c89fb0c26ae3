use std::convert::TryFrom;

use alloy::primitives::B256;
use chain::model::{Block, Log, Transaction};
use eyre::{Result, eyre};

use crate::model::{BlockRow, LogRow, TransactionRow};

fn to_i64(value: u64, field: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| eyre!("{field} {value} does not fit a signed 64-bit column"))
}

impl TryFrom<&Block> for BlockRow {
    type Error = eyre::Report;

    fn try_from(block: &Block) -> Result<Self> {
        Ok(Self {
            number: to_i64(block.number, "block number")?,
            hash: block.hash.to_string(),
            gas_limit: to_i64(block.gas_limit, "gas limit")?,
            gas_used: to_i64(block.gas_used, "gas used")?,
            difficulty: block.difficulty.to_string(),
            timestamp: to_i64(block.timestamp, "timestamp")?,
            nonce: format!("{:#018x}", block.nonce),
            state_root: block.state_root.to_string(),
            parent_hash: block.parent_hash.to_string(),
            transactions_root: block.transactions_root.to_string(),
            uncle_hash: block.uncle_hash.to_string(),
            extra_data: block.extra_data.to_vec(),
        })
    }
}

impl TryFrom<&Transaction> for TransactionRow {
    type Error = eyre::Report;

    fn try_from(tx: &Transaction) -> Result<Self> {
        let block_number =
            tx.block_number.ok_or_else(|| eyre!("transaction {} is still pending", tx.hash))?;
        Ok(Self {
            hash: tx.hash.to_string(),
            block_number: to_i64(block_number, "block number")?,
            nonce: to_i64(tx.nonce, "nonce")?,
            from_address: tx.from.to_string().to_lowercase(),
            to_address: tx.to.map(|to| to.to_string().to_lowercase()).unwrap_or_default(),
            value: tx.value.to_string(),
            input: tx.input.to_vec(),
        })
    }
}

/// Rows for the receipt logs of one transaction, indexed by receipt position.
pub fn log_rows(tx_hash: B256, logs: &[Log]) -> Vec<LogRow> {
    let tx_hash = tx_hash.to_string();
    logs.iter()
        .enumerate()
        .map(|(index, log)| LogRow {
            tx_hash: tx_hash.clone(),
            log_index: index as i64,
            data: log.data.to_vec(),
        })
        .collect()
}
