use alloy::primitives::{Address, B256, Bytes, U256};

/// A block as served by the upstream node, transactions included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub hash: B256,
    pub number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub difficulty: U256,
    pub timestamp: u64,
    pub nonce: u64,
    pub state_root: B256,
    pub parent_hash: B256,
    pub transactions_root: B256,
    pub uncle_hash: B256,
    pub extra_data: Bytes,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    pub hash: B256,
    /// `None` while the transaction is still pending.
    pub block_number: Option<u64>,
    pub nonce: u64,
    pub from: Address,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value: U256,
    pub input: Bytes,
}

impl Transaction {
    pub fn is_pending(&self) -> bool {
        self.block_number.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}
