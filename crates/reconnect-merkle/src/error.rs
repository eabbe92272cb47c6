//! Error types for reconnect-merkle.

use thiserror::Error;

/// Result type for tree store operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A child index past the end of the child list.
    #[error("child index {index} out of range for {len} children")]
    ChildIndex { index: usize, len: usize },

    /// A child operation on a leaf.
    #[error("node is a leaf")]
    NotInternal,

    /// A node record could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

impl From<Error> for reconnect_protocol::Error {
    fn from(e: Error) -> Self {
        reconnect_protocol::Error::view(e)
    }
}
