use eyre::{Result, eyre};
use serde::Serialize;
use store::error::StorageError;
use store::facade::{MAX_BLOCK_RANGE, Storage};

use crate::cli::query::args::{Query, Target};
use crate::cli::query::response::{
    BlockResponse, BlockResponseWithTx, ErrorResponse, TxResponse,
};

/// Failed lookup, with the status an HTTP front would answer.
struct Failure {
    status: u16,
    error: String,
}

impl Failure {
    fn bad_request(error: impl ToString) -> Self {
        Self { status: 400, error: error.to_string() }
    }
}

impl From<StorageError> for Failure {
    fn from(err: StorageError) -> Self {
        let status = match err {
            StorageError::InvalidKey { .. } => 400,
            _ => 404,
        };
        Self { status, error: err.to_string() }
    }
}

/// Prints the JSON answer on stdout. A failed lookup prints an error object and returns an
/// error so the process exits non-zero.
pub async fn select(query: &Query) -> Result<()> {
    let storage = query.connection.storage().await?;

    let answer = lookup(&storage, &query.target).await;
    storage.flush_write_backs().await;
    storage.scanner().close();

    match answer {
        Ok(json) => {
            println!("{json}");
            Ok(())
        }
        Err(failure) => {
            let response = ErrorResponse { status: failure.status, error: failure.error };
            println!("{}", serde_json::to_string_pretty(&response)?);
            Err(eyre!("query failed with status {}", response.status))
        }
    }
}

async fn lookup(storage: &Storage, target: &Target) -> Result<String, Failure> {
    match target {
        Target::Tx { hash } => {
            let tx = storage.transaction(hash).await?;
            let logs = storage.logs(&tx.hash).await?;
            render(&TxResponse::new(tx, logs))
        }
        Target::Block { number } => {
            let number = number.parse::<u64>().map_err(Failure::bad_request)?;
            let block = storage.block(number).await?;
            let transactions = storage.transactions_by_block(number).await?;
            render(&BlockResponseWithTx::new(block, transactions))
        }
        Target::Blocks { limit } => {
            let limit = limit.parse::<u64>().map_err(Failure::bad_request)?;
            if limit > MAX_BLOCK_RANGE {
                return Err(Failure::bad_request(format!("limit above {MAX_BLOCK_RANGE}")));
            }
            let blocks = storage.recent_blocks(limit).await?;
            let response: Vec<BlockResponse> = blocks.into_iter().map(BlockResponse::from).collect();
            render(&response)
        }
    }
}

fn render<T: Serialize>(response: &T) -> Result<String, Failure> {
    serde_json::to_string_pretty(response)
        .map_err(|err| Failure { status: 500, error: err.to_string() })
}
