use thiserror::Error;

/// Text some node clients surface when the peer drops the socket.
pub const CONNECTION_RESET: &str = "connection reset by peer";

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("transient transport error: {0}")]
    Transient(String),
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Permanent(String),
}

impl UpstreamError {
    /// Classifies an opaque error message, for clients that do not expose a typed error.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains(CONNECTION_RESET) {
            UpstreamError::Transient(message)
        } else {
            UpstreamError::Permanent(message)
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, UpstreamError::Transient(_))
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("{op}: not found")]
    NotFound { op: &'static str },
    #[error("{op}: gave up after {attempts} attempts: {source}")]
    Exhausted {
        op: &'static str,
        attempts: u32,
        #[source]
        source: UpstreamError,
    },
    #[error("{op}: scanner is closed")]
    Closed { op: &'static str },
}

impl ScanError {
    pub fn op(&self) -> &'static str {
        match self {
            ScanError::NotFound { op } | ScanError::Exhausted { op, .. } | ScanError::Closed { op } => {
                op
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ScanError::NotFound { .. })
    }
}
