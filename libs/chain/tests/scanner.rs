use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use alloy::primitives::{B256, Bytes};
use chain::error::{ScanError, UpstreamError};
use chain::model::{Block, Log, Transaction};
use chain::scanner::{Scanner, ScannerOptions};
use chain::upstream::{Connector, Upstream};
use eyre::Result;

#[derive(Clone, Copy)]
enum Failure {
    Transient,
    Permanent,
    NotFound,
}

impl Failure {
    fn to_error(self) -> UpstreamError {
        match self {
            Failure::Transient => UpstreamError::from_message("read tcp: connection reset by peer"),
            Failure::Permanent => UpstreamError::Permanent("execution reverted".to_string()),
            Failure::NotFound => UpstreamError::NotFound,
        }
    }
}

/// Fails the first `failures` calls, then answers.
struct FlakyNode {
    failures: u32,
    failure: Failure,
    calls: AtomicU32,
    pending: bool,
}

impl FlakyNode {
    fn new(failures: u32, failure: Failure) -> Arc<Self> {
        Arc::new(Self { failures, failure, calls: AtomicU32::new(0), pending: false })
    }

    fn attempt(&self) -> Result<(), UpstreamError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures { Err(self.failure.to_error()) } else { Ok(()) }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Upstream for FlakyNode {
    async fn block_by_number(&self, number: u64) -> Result<Block, UpstreamError> {
        self.attempt()?;
        Ok(Block { number, ..Default::default() })
    }

    async fn block_by_hash(&self, hash: B256) -> Result<Block, UpstreamError> {
        self.attempt()?;
        Ok(Block { hash, ..Default::default() })
    }

    async fn transaction_by_hash(&self, hash: B256) -> Result<(Transaction, bool), UpstreamError> {
        self.attempt()?;
        let block_number = if self.pending { None } else { Some(7) };
        Ok((Transaction { hash, block_number, ..Default::default() }, self.pending))
    }

    async fn transaction_logs(&self, _hash: B256) -> Result<Vec<Log>, UpstreamError> {
        self.attempt()?;
        Ok(vec![Log { data: Bytes::from_static(b"log"), ..Default::default() }])
    }

    async fn latest_block_number(&self) -> Result<u64, UpstreamError> {
        self.attempt()?;
        Ok(103)
    }
}

/// Hands out the same node every time and counts how often it was asked to.
struct CountingConnector {
    node: Arc<FlakyNode>,
    connects: AtomicU32,
}

impl CountingConnector {
    fn new(node: Arc<FlakyNode>) -> Arc<Self> {
        Arc::new(Self { node, connects: AtomicU32::new(0) })
    }

    fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Connector for CountingConnector {
    fn connect(&self) -> Result<Arc<dyn Upstream>, UpstreamError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let node: Arc<dyn Upstream> = self.node.clone();
        Ok(node)
    }
}

fn options(max_retry: u32) -> ScannerOptions {
    ScannerOptions {
        max_retry,
        backoff: Duration::from_millis(10),
        log_backoff: Duration::from_millis(1),
    }
}

#[tokio::test(start_paused = true)]
async fn test_succeeds_on_last_attempt() -> Result<()> {
    let node = FlakyNode::new(2, Failure::Transient);
    let connector = CountingConnector::new(node.clone());
    let scanner = Scanner::new(connector.clone(), options(3))?;

    let block = scanner.block_by_number(42).await?;

    assert_eq!(block.number, 42);
    assert_eq!(node.calls(), 3);
    // initial client plus one per transient failure
    assert_eq!(connector.connects(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_max_retry() -> Result<()> {
    let node = FlakyNode::new(3, Failure::Transient);
    let scanner = Scanner::new(CountingConnector::new(node.clone()), options(3))?;

    let err = scanner.block_by_number(42).await.unwrap_err();

    assert!(matches!(err, ScanError::Exhausted { op: "block_by_number", attempts: 3, .. }));
    assert!(err.to_string().contains("block_by_number"));
    assert_eq!(node.calls(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_permanent_errors_keep_the_client() -> Result<()> {
    let node = FlakyNode::new(2, Failure::Permanent);
    let connector = CountingConnector::new(node.clone());
    let scanner = Scanner::new(connector.clone(), options(5))?;

    assert_eq!(scanner.latest_block_number().await?, 103);
    assert_eq!(node.calls(), 3);
    assert_eq!(connector.connects(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_not_found_is_not_retried() -> Result<()> {
    let node = FlakyNode::new(10, Failure::NotFound);
    let scanner = Scanner::new(CountingConnector::new(node.clone()), options(5))?;

    let err = scanner.block_by_hash(B256::repeat_byte(0xAB)).await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.op(), "block_by_hash");
    assert_eq!(node.calls(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_pending_transaction_has_no_logs() -> Result<()> {
    let node = Arc::new(FlakyNode {
        failures: 0,
        failure: Failure::Transient,
        calls: AtomicU32::new(0),
        pending: true,
    });
    let scanner = Scanner::new(CountingConnector::new(node.clone()), options(3))?;

    let logs = scanner.logs_for_transaction(B256::repeat_byte(0x01)).await?;

    assert!(logs.is_empty());
    // only the detail lookup, no receipt
    assert_eq!(node.calls(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_mined_transaction_logs() -> Result<()> {
    let node = FlakyNode::new(1, Failure::Transient);
    let scanner = Scanner::new(CountingConnector::new(node.clone()), options(3))?;

    let logs = scanner.logs_for_transaction(B256::repeat_byte(0x01)).await?;

    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].data, Bytes::from_static(b"log"));
    Ok(())
}

/// Never answers, like a node that accepted the socket and went silent.
struct SilentNode;

#[async_trait::async_trait]
impl Upstream for SilentNode {
    async fn block_by_number(&self, _number: u64) -> Result<Block, UpstreamError> {
        std::future::pending().await
    }

    async fn block_by_hash(&self, _hash: B256) -> Result<Block, UpstreamError> {
        std::future::pending().await
    }

    async fn transaction_by_hash(&self, _hash: B256) -> Result<(Transaction, bool), UpstreamError> {
        std::future::pending().await
    }

    async fn transaction_logs(&self, _hash: B256) -> Result<Vec<Log>, UpstreamError> {
        std::future::pending().await
    }

    async fn latest_block_number(&self) -> Result<u64, UpstreamError> {
        std::future::pending().await
    }
}

struct SilentConnector;

impl Connector for SilentConnector {
    fn connect(&self) -> Result<Arc<dyn Upstream>, UpstreamError> {
        let node: Arc<dyn Upstream> = Arc::new(SilentNode);
        Ok(node)
    }
}

#[tokio::test]
async fn test_close_fails_in_flight_calls() -> Result<()> {
    let scanner = Arc::new(Scanner::new(Arc::new(SilentConnector), options(3))?);

    let in_flight = tokio::spawn({
        let scanner = Arc::clone(&scanner);
        async move { scanner.block_by_number(1).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    scanner.close();
    scanner.close();

    let err = in_flight.await?.unwrap_err();
    assert!(matches!(err, ScanError::Closed { op: "block_by_number" }));

    let err = scanner.latest_block_number().await.unwrap_err();
    assert!(matches!(err, ScanError::Closed { .. }));
    assert!(scanner.is_closed());
    Ok(())
}
