//! A shared, ordered byte connection between two peers.
//!
//! One reconnect session is made of several subtree exchanges that run one
//! after another over the same transport. A [`Connection`] owns both halves
//! of that transport and hands out typed streams for each exchange.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::frame::DEFAULT_MAX_FRAME_SIZE;
use crate::input::AsyncInputStream;
use crate::message::WireMessage;
use crate::output::AsyncOutputStream;

/// Read half of a connection.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of a connection.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Tuning for streams opened on a connection.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Capacity of the in-memory queues between callers and the IO tasks
    pub buffer_size: usize,
    /// How long a read waits for an anticipated message
    pub timeout: Duration,
    /// Largest accepted frame body in bytes
    pub max_frame_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_size: 10_000,
            timeout: Duration::from_secs(100),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Both halves of a transport, shareable across consecutive sessions.
#[derive(Clone)]
pub struct Connection {
    reader: Arc<Mutex<BoxedReader>>,
    writer: Arc<Mutex<BoxedWriter>>,
    config: StreamConfig,
}

impl Connection {
    /// Wrap a bidirectional transport.
    pub fn new<T>(io: T, config: StreamConfig) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(io);
        Self::from_parts(Box::new(reader), Box::new(writer), config)
    }

    /// Build a connection from separately owned halves.
    pub fn from_parts(reader: BoxedReader, writer: BoxedWriter, config: StreamConfig) -> Self {
        Self {
            reader: Arc::new(Mutex::new(reader)),
            writer: Arc::new(Mutex::new(writer)),
            config,
        }
    }

    /// Wrap a connected TCP stream.
    pub fn from_tcp(stream: TcpStream, config: StreamConfig) -> Self {
        let (reader, writer) = stream.into_split();
        Self::from_parts(Box::new(reader), Box::new(writer), config)
    }

    /// An in-memory pair of connected peers.
    pub fn duplex(max_buf_size: usize, config: StreamConfig) -> (Self, Self) {
        let (a, b) = tokio::io::duplex(max_buf_size);
        (Self::new(a, config.clone()), Self::new(b, config))
    }

    /// Stream configuration in effect for this connection.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Open a typed input stream. Must be called inside a tokio runtime.
    pub fn input<M: WireMessage>(&self) -> AsyncInputStream<M> {
        AsyncInputStream::spawn(self.reader.clone(), &self.config)
    }

    /// Open a typed output stream. Must be called inside a tokio runtime.
    pub fn output<M: WireMessage>(&self) -> AsyncOutputStream<M> {
        AsyncOutputStream::spawn(self.writer.clone(), &self.config)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
