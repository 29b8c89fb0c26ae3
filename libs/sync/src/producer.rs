use std::{future::Future, pin::Pin, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub type ProducerCallback<T> =
    dyn Fn() -> Pin<Box<dyn Future<Output = Option<T>> + Send>> + Send + Sync + 'static;

/// Calls its callback once per period and forwards whatever it yields.
pub struct Producer<T: 'static> {
    producer_callback: Arc<ProducerCallback<T>>,
    period: Duration,
    tx: mpsc::Sender<T>,
    shutdown: CancellationToken,
}

impl<T> Producer<T> {
    pub fn new(
        producer_callback: Arc<ProducerCallback<T>>,
        period: Duration,
        tx: mpsc::Sender<T>,
        shutdown: CancellationToken,
    ) -> Self {
        Self { producer_callback, period, tx, shutdown }
    }
}

impl<T: Send + Sync + 'static> Producer<T> {
    pub fn spawn<F, Fut>(
        tx: mpsc::Sender<T>,
        period: Duration,
        shutdown: CancellationToken,
        producer_callback_factory: F,
    ) -> tokio::task::JoinHandle<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<T>> + Send + 'static,
    {
        let producer_callback: Arc<ProducerCallback<T>> =
            Arc::new(move || Box::pin(producer_callback_factory()));

        let producer = Producer::new(producer_callback, period, tx, shutdown);

        tokio::spawn(async move { producer.run().await })
    }
}

impl<T> Producer<T> {
    /// Runs until shutdown or until the receiver is dropped. The first call happens one period
    /// after start; a `None` from the callback is skipped.
    pub async fn run(&self) {
        let period = self.period.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let message = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                message = async {
                    // Execute the callback
                    let callback = Arc::clone(&self.producer_callback);
                    callback().await
                } => message,
            };

            let Some(message) = message else { continue };
            if self.tx.send(message).await.is_err() {
                // The receiver dropped
                break;
            }
        }

        debug!("producer stopped");
    }
}
