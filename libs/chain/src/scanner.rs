use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use alloy::primitives::B256;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{ScanError, UpstreamError};
use crate::model::{Block, Log, Transaction};
use crate::upstream::{Connector, Upstream};

#[derive(Debug, Clone)]
pub struct ScannerOptions {
    /// Total attempts per call, the first one included.
    pub max_retry: u32,
    /// Wait between attempts for block, transaction and height calls.
    pub backoff: Duration,
    /// Wait between attempts for receipt log calls.
    pub log_backoff: Duration,
}

impl Default for ScannerOptions {
    fn default() -> Self {
        Self { max_retry: 5, backoff: Duration::from_secs(1), log_backoff: Duration::from_millis(100) }
    }
}

/// Upstream reads with bounded retry.
///
/// A transient failure swaps the current client for a fresh one from the [`Connector`] before
/// the next attempt; any other failure retries on the same client. A not-found answer is final.
pub struct Scanner {
    connector: Arc<dyn Connector>,
    client: RwLock<Arc<dyn Upstream>>,
    options: ScannerOptions,
    shutdown: CancellationToken,
}

impl Scanner {
    pub fn new(connector: Arc<dyn Connector>, options: ScannerOptions) -> Result<Self, UpstreamError> {
        let client = connector.connect()?;
        Ok(Self { connector, client: RwLock::new(client), options, shutdown: CancellationToken::new() })
    }

    pub fn options(&self) -> &ScannerOptions {
        &self.options
    }

    pub async fn block_by_number(&self, number: u64) -> Result<Block, ScanError> {
        self.with_retry("block_by_number", self.options.backoff, |client| async move {
            client.block_by_number(number).await
        })
        .await
    }

    pub async fn block_by_hash(&self, hash: B256) -> Result<Block, ScanError> {
        self.with_retry("block_by_hash", self.options.backoff, |client| async move {
            client.block_by_hash(hash).await
        })
        .await
    }

    /// The transaction and whether it is still pending.
    pub async fn transaction_detail(&self, hash: B256) -> Result<(Transaction, bool), ScanError> {
        self.with_retry("transaction_detail", self.options.backoff, |client| async move {
            client.transaction_by_hash(hash).await
        })
        .await
    }

    /// Receipt logs of a mined transaction; a pending transaction has none.
    pub async fn logs_for_transaction(&self, hash: B256) -> Result<Vec<Log>, ScanError> {
        let (_, is_pending) = self.transaction_detail(hash).await?;
        if is_pending {
            return Ok(Vec::new());
        }
        self.receipt_logs(hash).await
    }

    /// Receipt logs without the pending check; for callers that already hold the detail.
    pub async fn receipt_logs(&self, hash: B256) -> Result<Vec<Log>, ScanError> {
        self.with_retry("logs_for_transaction", self.options.log_backoff, |client| async move {
            client.transaction_logs(hash).await
        })
        .await
    }

    pub async fn latest_block_number(&self) -> Result<u64, ScanError> {
        self.with_retry("latest_block_number", self.options.backoff, |client| async move {
            client.latest_block_number().await
        })
        .await
    }

    /// Fails in-flight calls and every later one. Idempotent.
    pub fn close(&self) {
        if !self.shutdown.is_cancelled() {
            info!("closing upstream scanner");
            self.shutdown.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn client(&self) -> Arc<dyn Upstream> {
        Arc::clone(&self.client.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn reconnect(&self, op: &'static str) {
        match self.connector.connect() {
            Ok(client) => {
                *self.client.write().unwrap_or_else(PoisonError::into_inner) = client;
                info!(op, "recreated upstream client");
            }
            Err(err) => warn!(op, error = %err, "failed to recreate upstream client"),
        }
    }

    async fn with_retry<T, F, Fut>(
        &self,
        op: &'static str,
        backoff: Duration,
        call: F,
    ) -> Result<T, ScanError>
    where
        F: Fn(Arc<dyn Upstream>) -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let attempts = self.options.max_retry.max(1);
        let mut attempt = 0;

        loop {
            if self.shutdown.is_cancelled() {
                return Err(ScanError::Closed { op });
            }
            attempt += 1;

            let result = tokio::select! {
                _ = self.shutdown.cancelled() => return Err(ScanError::Closed { op }),
                result = call(self.client()) => result,
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(UpstreamError::NotFound) => return Err(ScanError::NotFound { op }),
                Err(err) => err,
            };

            if attempt >= attempts {
                return Err(ScanError::Exhausted { op, attempts, source: err });
            }

            warn!(op, attempt, attempts, error = %err, "upstream call failed, retrying");
            if err.is_transient() {
                self.reconnect(op);
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => return Err(ScanError::Closed { op }),
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }
}
