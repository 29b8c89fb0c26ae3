use std::fmt::{Debug, Formatter, Result};

use crate::model::{BlockRow, LogRow, TransactionRow};
use crate::utils;

impl Debug for BlockRow {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_struct("BlockRow")
            .field("number", &self.number)
            .field("hash", &self.hash)
            .field("parent_hash", &self.parent_hash)
            .field("timestamp", &self.timestamp)
            .field("gas_used", &self.gas_used)
            .field("gas_limit", &self.gas_limit)
            .field("difficulty", &self.difficulty)
            .field("nonce", &self.nonce)
            .field("state_root", &self.state_root)
            .field("transactions_root", &self.transactions_root)
            .field("uncle_hash", &self.uncle_hash)
            .field("extra_data", &utils::bytes_to_hex(&self.extra_data))
            .finish()
    }
}

impl Debug for TransactionRow {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_struct("TransactionRow")
            .field("hash", &self.hash)
            .field("block_number", &self.block_number)
            .field("nonce", &self.nonce)
            .field("from_address", &self.from_address)
            .field("to_address", &self.to_address)
            .field("value", &self.value)
            .field("input", &utils::bytes_to_hex(&self.input))
            .finish()
    }
}

impl Debug for LogRow {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_struct("LogRow")
            .field("tx_hash", &self.tx_hash)
            .field("log_index", &self.log_index)
            .field("data", &utils::bytes_to_hex(&self.data))
            .finish()
    }
}
