//! Error types for reconnect-stream.

use std::time::Duration;

use thiserror::Error;

/// Result type for stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;

/// Errors raised while reading or writing a message stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The underlying transport failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream (or its background task) is already closed.
    #[error("stream closed")]
    Closed,

    /// A read was attempted without a matching anticipation.
    #[error("read of a message that was never anticipated")]
    NotAnticipated,

    /// No anticipated message arrived in time.
    #[error("timed out after {0:?} waiting for an anticipated message")]
    Timeout(Duration),

    /// A frame larger than the configured limit was announced.
    #[error("frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    /// A frame could not be decoded into the expected message type.
    #[error("malformed message: {0}")]
    Malformed(String),
}

impl StreamError {
    /// Shorthand for a decoding failure.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }
}
