//! Error types for reconnect-protocol.

use reconnect_stream::StreamError;
use thiserror::Error;

use crate::hash::ClassId;

/// Result type for reconnect-protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can end a reconnect session.
///
/// Everything except [`Error::Interrupted`] is a synchronization failure:
/// the session is abandoned and the caller decides whether to retry.
#[derive(Debug, Error)]
pub enum Error {
    /// The peers disagreed about the protocol state.
    #[error("synchronization failed: {0}")]
    Synchronization(String),

    /// A custom view root names a class this side cannot construct.
    #[error("no custom view registered for class {0}")]
    UnknownCustomRoot(ClassId),

    /// A query response arrived with no query waiting for it.
    #[error("received a query response that was not expected")]
    UnexpectedResponse,

    /// An original node had no hash while answering a query (strict mode).
    #[error("original child {child_index} has no hash")]
    MissingHash { child_index: usize },

    /// Reading or writing a stream failed.
    #[error("transport error: {0}")]
    Transport(#[from] StreamError),

    /// The backing tree store failed.
    #[error("view error: {0}")]
    View(String),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),

    /// A worker task panicked.
    #[error("worker {0} panicked")]
    WorkerPanicked(String),

    /// The session was interrupted.
    #[error("reconnect interrupted")]
    Interrupted,
}

impl Error {
    /// Shorthand for a protocol violation.
    pub fn sync(reason: impl Into<String>) -> Self {
        Self::Synchronization(reason.into())
    }

    /// Shorthand for a backing store failure.
    pub fn view(reason: impl std::fmt::Display) -> Self {
        Self::View(reason.to_string())
    }

    /// Whether this error is a cooperative shutdown rather than a failure.
    pub fn is_interruption(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}
