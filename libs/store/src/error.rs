use chain::error::ScanError;
use thiserror::Error;

/// Failure of a single tier.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sql: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("cache codec: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Failure of a [`Storage`](crate::facade::Storage) operation after every tier was tried.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{op}: not found")]
    NotFound { op: &'static str },
    #[error("{op}: invalid key {key:?}")]
    InvalidKey { op: &'static str, key: String },
    #[error("{op}: {source}")]
    Upstream {
        op: &'static str,
        #[source]
        source: ScanError,
    },
    #[error("{op}: {source}")]
    Store {
        op: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("{op}: {source}")]
    Convert {
        op: &'static str,
        #[source]
        source: eyre::Report,
    },
}

impl StorageError {
    pub(crate) fn upstream(op: &'static str, source: ScanError) -> Self {
        if source.is_not_found() {
            StorageError::NotFound { op }
        } else {
            StorageError::Upstream { op, source }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}
