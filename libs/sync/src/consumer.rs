use std::{future::Future, pin::Pin, sync::Arc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub type ConsumerCallback<T> =
    dyn Fn(T) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static;

/// Runs its callback on every message, one at a time, in arrival order.
pub struct Consumer<T: 'static> {
    consumer_callback: Arc<ConsumerCallback<T>>,
    rx: mpsc::Receiver<T>,
    shutdown: CancellationToken,
}

impl<T> Consumer<T> {
    pub fn new(
        consumer_callback: Arc<ConsumerCallback<T>>,
        rx: mpsc::Receiver<T>,
        shutdown: CancellationToken,
    ) -> Self {
        Self { consumer_callback, rx, shutdown }
    }
}

impl<T: Send + Sync + 'static> Consumer<T> {
    pub fn spawn<F, Fut>(
        rx: mpsc::Receiver<T>,
        shutdown: CancellationToken,
        consumer_callback_factory: F,
    ) -> tokio::task::JoinHandle<()>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let consumer_callback: Arc<ConsumerCallback<T>> =
            Arc::new(move |msg: T| Box::pin(consumer_callback_factory(msg)));

        let mut consumer = Consumer::new(consumer_callback, rx, shutdown);

        tokio::spawn(async move { consumer.run().await })
    }
}

impl<T> Consumer<T> {
    /// Runs until shutdown or until every sender is dropped. A callback in progress when
    /// shutdown fires is allowed to finish.
    pub async fn run(&mut self) {
        loop {
            let message = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                message = self.rx.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            let callback = Arc::clone(&self.consumer_callback);
            callback(message).await;
        }

        debug!("consumer stopped");
    }
}
