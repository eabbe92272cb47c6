//! Worker tracking for reconnect sessions.
//!
//! A [`WorkGroup`] starts the workers of one subtree and waits for all of
//! them. The first failure aborts the rest. An [`Interrupter`] shared by
//! every group of a session stops them all cooperatively.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::error::{Error, Result};

/// Cloneable handle that interrupts a running session.
#[derive(Debug, Clone, Default)]
pub struct Interrupter {
    inner: Arc<InterruptState>,
}

#[derive(Debug, Default)]
struct InterruptState {
    interrupted: AtomicBool,
    notify: Notify,
}

impl Interrupter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every worker of the session to stop.
    pub fn interrupt(&self) {
        self.inner.interrupted.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupted.load(Ordering::SeqCst)
    }

    /// Resolves once [`Interrupter::interrupt`] has been called.
    pub async fn interrupted(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_interrupted() {
                return;
            }
            notified.await;
        }
    }

    /// Fail with [`Error::Interrupted`] if the session was interrupted.
    pub fn check(&self) -> Result<()> {
        if self.is_interrupted() {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// The set of workers running for one subtree.
pub struct WorkGroup {
    tasks: JoinSet<(String, Result<()>)>,
    interrupter: Interrupter,
}

impl WorkGroup {
    pub fn new(interrupter: Interrupter) -> Self {
        Self {
            tasks: JoinSet::new(),
            interrupter,
        }
    }

    /// Start a named worker. The worker runs inside a span carrying its name.
    pub fn execute<F>(&mut self, name: impl Into<String>, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let name = name.into();
        let span = tracing::info_span!("worker", name = %name);
        tracing::debug!("starting worker {}", name);
        self.tasks.spawn(async move {
            let result = AssertUnwindSafe(task.instrument(span))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(Error::WorkerPanicked(name.clone())));
            (name, result)
        });
    }

    /// Wait for every worker.
    ///
    /// On the first failure, or on interruption, the remaining workers are
    /// aborted and that first error is returned once all have stopped.
    pub async fn join_all(&mut self) -> Result<()> {
        let mut first_error: Option<Error> = None;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.interrupter.interrupted(), if first_error.is_none() => {
                    tracing::debug!("work group interrupted, aborting {} workers", self.tasks.len());
                    self.tasks.abort_all();
                    first_error = Some(Error::Interrupted);
                    continue;
                }
                next = self.tasks.join_next() => next,
            };

            let Some(joined) = next else {
                break;
            };

            // Only aborted tasks fail to join; panics are caught inside.
            let outcome = match joined {
                Ok((name, result)) => result.map_err(|e| (name, e)),
                Err(_) => Err((String::new(), Error::Interrupted)),
            };

            if let Err((name, error)) = outcome {
                if first_error.is_none() {
                    if !error.is_interruption() {
                        tracing::error!("worker {} failed: {}", name, error);
                    }
                    self.tasks.abort_all();
                    first_error = Some(error);
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Drop for WorkGroup {
    fn drop(&mut self) {
        self.tasks.abort_all();
    }
}
