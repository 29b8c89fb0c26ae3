use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("queue is closed")]
    Closed,
    #[error("unsupported queue url: {0}")]
    UnsupportedUrl(String),
}
