//! Input side of a message stream.
//!
//! Reads are pulled off the wire by a background task, one frame per
//! anticipation. Callers announce each expected message with
//! [`AsyncInputStream::anticipate_message`] and later collect it, in order,
//! with [`AsyncInputStream::read_anticipated_message`].

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::connection::{BoxedReader, StreamConfig};
use crate::error::{Result, StreamError};
use crate::frame::read_frame;
use crate::message::WireMessage;

/// Typed, anticipation-driven reader over a shared connection.
pub struct AsyncInputStream<M: WireMessage> {
    anticipations: std::sync::Mutex<Option<mpsc::UnboundedSender<()>>>,
    messages: Mutex<mpsc::Receiver<Result<M>>>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
    anticipated: AtomicU64,
    consumed: AtomicU64,
    timeout: Duration,
    _marker: PhantomData<fn() -> M>,
}

impl<M: WireMessage> AsyncInputStream<M> {
    pub(crate) fn spawn(reader: Arc<Mutex<BoxedReader>>, config: &StreamConfig) -> Self {
        let (anticipate_tx, anticipate_rx) = mpsc::unbounded_channel();
        let (message_tx, message_rx) = mpsc::channel(config.buffer_size.max(1));
        let task = tokio::spawn(read_loop::<M>(
            reader,
            anticipate_rx,
            message_tx,
            config.max_frame_size,
        ));

        Self {
            anticipations: std::sync::Mutex::new(Some(anticipate_tx)),
            messages: Mutex::new(message_rx),
            task: std::sync::Mutex::new(Some(task)),
            anticipated: AtomicU64::new(0),
            consumed: AtomicU64::new(0),
            timeout: config.timeout,
            _marker: PhantomData,
        }
    }

    /// Announce that one more message will arrive.
    pub fn anticipate_message(&self) -> Result<()> {
        let guard = self
            .anticipations
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let sender = guard.as_ref().ok_or(StreamError::Closed)?;
        sender.send(()).map_err(|_| StreamError::Closed)?;
        self.anticipated.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Wait for the oldest anticipated message that has not been read yet.
    pub async fn read_anticipated_message(&self) -> Result<M> {
        let mut messages = self.messages.lock().await;
        if self.outstanding() == 0 {
            return Err(StreamError::NotAnticipated);
        }

        let next = tokio::time::timeout(self.timeout, messages.recv())
            .await
            .map_err(|_| StreamError::Timeout(self.timeout))?;
        let message = next.ok_or(StreamError::Closed)?;
        self.consumed.fetch_add(1, Ordering::AcqRel);
        message
    }

    /// Number of anticipated messages that have not been read.
    pub fn outstanding(&self) -> u64 {
        self.anticipated
            .load(Ordering::Acquire)
            .saturating_sub(self.consumed.load(Ordering::Acquire))
    }

    /// Stop reading and release the connection's read half.
    ///
    /// When every anticipated message has been read the background task
    /// exits on its own. Otherwise it is aborted and the unread messages are
    /// lost.
    pub async fn close(&self) -> Result<()> {
        self.anticipations
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();

        let task = self
            .task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        let Some(task) = task else {
            return Ok(());
        };

        let outstanding = self.outstanding();
        if outstanding > 0 {
            tracing::debug!("closing input stream with {} unread messages", outstanding);
            task.abort();
        }
        // An aborted task reports a cancellation, which is expected here.
        let _ = task.await;
        Ok(())
    }
}

impl<M: WireMessage> Drop for AsyncInputStream<M> {
    fn drop(&mut self) {
        let task = self
            .task
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

async fn read_loop<M: WireMessage>(
    reader: Arc<Mutex<BoxedReader>>,
    mut anticipations: mpsc::UnboundedReceiver<()>,
    messages: mpsc::Sender<Result<M>>,
    max_frame_size: usize,
) {
    while anticipations.recv().await.is_some() {
        let frame = {
            let mut reader = reader.lock().await;
            read_frame(&mut *reader, max_frame_size).await
        };
        let message = frame.and_then(M::decode);
        let failed = message.is_err();

        if messages.send(message).await.is_err() || failed {
            break;
        }
    }
    tracing::trace!("input stream reader exiting");
}
