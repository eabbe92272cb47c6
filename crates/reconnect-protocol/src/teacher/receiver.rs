use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reconnect_stream::AsyncInputStream;

use crate::error::Result;
use crate::lesson::QueryResponse;
use crate::stats::TeacherCounters;
use crate::view::TeacherView;

/// Reads query responses and feeds them into the shadow send-tree.
pub(super) struct ReceivingWorker<V: TeacherView> {
    pub(super) view: Arc<V>,
    pub(super) responses: Arc<AsyncInputStream<QueryResponse>>,
    pub(super) finished: Arc<AtomicBool>,
    pub(super) counters: Arc<TeacherCounters>,
    pub(super) idle_sleep: Duration,
}

impl<V: TeacherView> ReceivingWorker<V> {
    pub(super) async fn run(self) -> Result<()> {
        let result = self.receive_responses().await;
        let closed = self.responses.close().await;
        result?;
        closed?;
        Ok(())
    }

    async fn receive_responses(&self) -> Result<()> {
        loop {
            if self.view.is_response_expected() {
                let response = self.responses.read_anticipated_message().await?;
                let entry = self.view.node_for_next_response()?;
                self.view
                    .register_response_for_node(&entry, response.has_node());
                self.counters.record_response(response.has_node());
            } else if self.finished.load(Ordering::SeqCst) {
                // The sender may have queued a last batch before finishing.
                if !self.view.is_response_expected() {
                    return Ok(());
                }
            } else {
                tokio::time::sleep(self.idle_sleep).await;
            }
        }
    }
}
