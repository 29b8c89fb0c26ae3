use eyre::Result;

/// Destination of a [`BatchWriter`](crate::batch::BatchWriter).
///
/// A batch may be handed over again after a crash, so writes must be idempotent.
#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    type Item;

    async fn process_batch(&self, elements: &[Self::Item]) -> Result<()>;
}
