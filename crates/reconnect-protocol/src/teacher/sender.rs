use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reconnect_stream::{AsyncInputStream, AsyncOutputStream};
use tracing::trace;

use crate::error::{Error, Result};
use crate::handoff::{SubtreeQueue, TeacherSubtree};
use crate::lesson::{Lesson, QueryResponse};
use crate::stats::TeacherCounters;
use crate::view::{SendEntry, TeacherView};

/// Emits lessons for one subtree, breadth first.
pub(super) struct SendingWorker<V: TeacherView> {
    pub(super) view: Arc<V>,
    pub(super) lessons: AsyncOutputStream<Lesson>,
    pub(super) responses: Arc<AsyncInputStream<QueryResponse>>,
    pub(super) finished: Arc<AtomicBool>,
    pub(super) counters: Arc<TeacherCounters>,
    pub(super) subtrees: SubtreeQueue<TeacherSubtree>,
}

impl<V: TeacherView> SendingWorker<V> {
    pub(super) async fn run(mut self) -> Result<()> {
        let result = self.send_lessons().await;
        self.finished.store(true, Ordering::SeqCst);
        let closed = self.lessons.close().await;
        result?;
        closed?;
        Ok(())
    }

    async fn send_lessons(&mut self) -> Result<()> {
        // The subtree root always goes out as data.
        let root = self
            .view
            .next_node_to_handle()
            .ok_or_else(|| Error::sync("no subtree root queued"))?;
        let lesson = self.data_lesson(&root)?;
        self.lessons.send_async(lesson).await?;

        while let Some(entry) = self.view.next_node_to_handle() {
            entry.wait_for_response().await;
            let lesson = self.lesson_for(&entry)?;
            trace!(kind = lesson.kind(), "sending lesson");
            self.lessons.send_async(lesson).await?;
        }
        Ok(())
    }

    fn lesson_for(&self, entry: &SendEntry<V::Node>) -> Result<Lesson> {
        if self.view.has_learner_confirmed_for(entry) {
            self.counters.record_up_to_date();
            return Ok(Lesson::UpToDate);
        }
        if !entry.response_received() {
            self.counters.record_forced_send();
        }

        let node = entry.node();
        if self.view.is_custom_reconnect_root(node) {
            let class = self.view.class_id(node);
            self.subtrees.push(self.view.custom_subtree(node)?);
            self.counters.record_custom_view_root();
            tracing::debug!("queued custom view subtree of class {}", class);
            return Ok(Lesson::CustomViewRoot(class));
        }

        self.data_lesson(entry)
    }

    fn data_lesson(&self, entry: &SendEntry<V::Node>) -> Result<Lesson> {
        let node = entry.node();
        if !self.view.is_internal(node) {
            let data = self.view.serialize_leaf(node)?;
            self.counters.record_leaf();
            return Ok(Lesson::LeafData(data));
        }

        let data = self.view.serialize_internal(node)?;
        let queries = self.view.child_hashes(node)?;
        for index in 0..queries.len() {
            // Anticipate first: the receiver reads as soon as the entry is queued.
            self.responses.anticipate_message()?;
            self.view.child_and_prepare_for_query_response(entry, index)?;
        }
        self.counters.record_internal();
        Ok(Lesson::InternalData { data, queries })
    }
}
