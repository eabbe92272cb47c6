//! Reconnect Stream - ordered message streams for reconnect sessions
//!
//! This crate provides:
//! - Length-prefixed framing over any ordered, reliable byte transport
//! - [`AsyncOutputStream`] for pipelined, batched message sends
//! - [`AsyncInputStream`] for reading messages in the order they were anticipated
//! - A shared [`Connection`] whose halves are handed from one subtree session
//!   to the next
//! - TCP transport setup with configurable socket buffers
//!
//! # Anticipation
//!
//! Messages carry no identifiers. The reader only pulls a frame off the wire
//! after the caller has announced that it expects one, so a stream never
//! consumes bytes that belong to the next session sharing the connection.
//!
//! # Example
//!
//! ```rust,ignore
//! use reconnect_stream::{Connection, StreamConfig};
//!
//! let (left, right) = Connection::duplex(64 * 1024, StreamConfig::default());
//!
//! let out = left.output::<Ping>();
//! out.send_async(Ping).await?;
//!
//! let input = right.input::<Ping>();
//! input.anticipate_message()?;
//! let ping = input.read_anticipated_message().await?;
//! ```

pub mod connection;
pub mod error;
pub mod frame;
pub mod input;
pub mod message;
pub mod output;
pub mod transport;

pub use connection::{Connection, StreamConfig};
pub use error::{Result, StreamError};
pub use input::AsyncInputStream;
pub use message::WireMessage;
pub use output::AsyncOutputStream;
pub use transport::{connect, ReconnectListener, TransportConfig};
