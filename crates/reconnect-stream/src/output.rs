//! Output side of a message stream.
//!
//! Sends are queued and written by a background task. Whatever is queued
//! when the task wakes up goes out in one batch, followed by a flush, so a
//! burst of small messages costs one write.

use std::marker::PhantomData;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::connection::{BoxedWriter, StreamConfig};
use crate::error::{Result, StreamError};
use crate::frame::encode_frame;
use crate::message::WireMessage;

/// Soft cap on a single batched write.
const MAX_BATCH_BYTES: usize = 256 * 1024;

/// Typed, pipelined writer over a shared connection.
pub struct AsyncOutputStream<M: WireMessage> {
    tx: Option<mpsc::Sender<M>>,
    task: Option<JoinHandle<Result<()>>>,
    _marker: PhantomData<fn(M)>,
}

impl<M: WireMessage> AsyncOutputStream<M> {
    pub(crate) fn spawn(writer: Arc<Mutex<BoxedWriter>>, config: &StreamConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.buffer_size.max(1));
        let task = tokio::spawn(write_loop(writer, rx));
        Self {
            tx: Some(tx),
            task: Some(task),
            _marker: PhantomData,
        }
    }

    /// Queue a message for sending.
    ///
    /// Fails with [`StreamError::Closed`] once the stream is closed or the
    /// writer task has stopped; [`AsyncOutputStream::close`] reports why.
    pub async fn send_async(&self, message: M) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(StreamError::Closed)?;
        tx.send(message).await.map_err(|_| StreamError::Closed)
    }

    /// Write out everything queued and release the connection's write half.
    pub async fn close(&mut self) -> Result<()> {
        self.tx.take();
        match self.task.take() {
            Some(task) => match task.await {
                Ok(result) => result,
                Err(e) => Err(StreamError::Io(std::io::Error::other(e.to_string()))),
            },
            None => Ok(()),
        }
    }
}

async fn write_loop<M: WireMessage>(
    writer: Arc<Mutex<BoxedWriter>>,
    mut rx: mpsc::Receiver<M>,
) -> Result<()> {
    let mut buf = BytesMut::with_capacity(8 * 1024);
    let mut batches = 0u64;

    while let Some(first) = rx.recv().await {
        encode_frame(&mut buf, &first);
        while buf.len() < MAX_BATCH_BYTES {
            match rx.try_recv() {
                Ok(next) => encode_frame(&mut buf, &next),
                Err(_) => break,
            }
        }

        let mut writer = writer.lock().await;
        writer.write_all(&buf).await?;
        writer.flush().await?;
        drop(writer);

        buf.clear();
        batches += 1;
    }

    tracing::trace!("output stream wrote {} batches", batches);
    Ok(())
}
