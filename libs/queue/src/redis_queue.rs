use std::sync::Arc;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::delivery::{Acker, Delivery, Subscription};
use crate::error::QueueError;
use crate::MessageQueue;

/// Seconds a consumer blocks on an empty queue before checking for shutdown.
const BLOCK_TIMEOUT_SECS: f64 = 1.0;

/// Reliable queue on redis lists.
///
/// Producers `LPUSH`; a consumer atomically moves the tail into its own processing list with
/// `BLMOVE`, and removes it from there on ack. Messages left in a processing list by a crashed
/// consumer are moved back when a consumer with the same tag starts.
pub struct RedisQueue {
    client: redis::Client,
    conn: ConnectionManager,
    shutdown: CancellationToken,
}

impl RedisQueue {
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client.clone()).await?;
        info!("connected to redis queue");
        Ok(Self { client, conn, shutdown: CancellationToken::new() })
    }

    fn processing_list(queue: &str, tag: &str) -> String {
        format!("{queue}:processing:{tag}")
    }

    async fn recover(&self, queue: &str, processing: &str) -> Result<usize, QueueError> {
        let mut conn = self.conn.clone();
        let mut recovered = 0;
        loop {
            let moved: Option<String> = redis::cmd("LMOVE")
                .arg(processing)
                .arg(queue)
                .arg("LEFT")
                .arg("RIGHT")
                .query_async(&mut conn)
                .await?;
            if moved.is_none() {
                break;
            }
            recovered += 1;
        }
        Ok(recovered)
    }
}

struct ListAcker {
    queue: String,
    processing: String,
    conn: ConnectionManager,
}

#[async_trait]
impl Acker for ListAcker {
    async fn ack(&self, payload: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.lrem(&self.processing, 1, payload).await?;
        Ok(())
    }

    async fn nack(&self, payload: &str, requeue: bool) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        if requeue {
            let _: () = redis::pipe()
                .atomic()
                .lrem(&self.processing, 1, payload)
                .ignore()
                .rpush(&self.queue, payload)
                .ignore()
                .query_async(&mut conn)
                .await?;
        } else {
            let _: i64 = conn.lrem(&self.processing, 1, payload).await?;
            warn!(queue = %self.queue, payload, "dropping rejected message");
        }
        Ok(())
    }
}

#[async_trait]
impl MessageQueue for RedisQueue {
    async fn publish(&self, queue: &str, payload: &str) -> Result<(), QueueError> {
        if self.shutdown.is_cancelled() {
            return Err(QueueError::Closed);
        }
        let mut conn = self.conn.clone();
        let _: i64 = conn.lpush(queue, payload).await?;
        debug!(queue, payload, "publish");
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        tag: &str,
        prefetch: usize,
    ) -> Result<Subscription, QueueError> {
        if self.shutdown.is_cancelled() {
            return Err(QueueError::Closed);
        }

        let processing = Self::processing_list(queue, tag);
        let recovered = self.recover(queue, &processing).await?;
        if recovered > 0 {
            info!(queue, tag, recovered, "requeued unacknowledged messages");
        }

        // blocking reads get a connection of their own
        let mut consumer = self.client.get_multiplexed_async_connection().await?;
        let acker: Arc<dyn Acker> = Arc::new(ListAcker {
            queue: queue.to_string(),
            processing: processing.clone(),
            conn: self.conn.clone(),
        });
        let permits = Arc::new(Semaphore::new(prefetch.max(1)));
        let stop = self.shutdown.child_token();
        let (tx, rx) = mpsc::channel(prefetch.max(1));

        info!(queue, tag, prefetch, "consumer started");
        let queue = queue.to_string();
        let mut blmove = redis::cmd("BLMOVE");
        blmove.arg(&queue).arg(&processing).arg("RIGHT").arg("LEFT").arg(BLOCK_TIMEOUT_SECS);
        let pump_stop = stop.clone();
        tokio::spawn(async move {
            loop {
                let permit = tokio::select! {
                    _ = pump_stop.cancelled() => break,
                    permit = Arc::clone(&permits).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                let payload = loop {
                    let next = blmove.query_async::<_, Option<String>>(&mut consumer);
                    let result = tokio::select! {
                        _ = pump_stop.cancelled() => return,
                        result = next => result,
                    };
                    match result {
                        Ok(Some(payload)) => break payload,
                        Ok(None) => {}
                        Err(err) => {
                            error!(queue = %queue, error = %err, "failed to read from queue");
                            tokio::select! {
                                _ = pump_stop.cancelled() => return,
                                _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
                            }
                        }
                    }
                };

                let delivery = Delivery::new(payload, Arc::clone(&acker), permit);
                if let Err(err) = tx.send(delivery).await {
                    // subscriber went away; the message stays in the processing list
                    debug!(queue = %queue, payload = err.0.payload(), "consumer dropped");
                    break;
                }
            }
        });

        Ok(Subscription::new(rx, stop))
    }

    async fn close(&self) -> Result<(), QueueError> {
        if !self.shutdown.is_cancelled() {
            info!("closing redis queue");
            self.shutdown.cancel();
        }
        Ok(())
    }
}
