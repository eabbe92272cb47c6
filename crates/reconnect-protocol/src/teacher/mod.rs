//! Teacher side of a reconnect session.
//!
//! Each subtree is taught by two workers sharing one view:
//! - the sending worker walks the tree breadth first and emits one lesson
//!   per node, embedding a query for every child of an internal node
//! - the receiving worker reads the learner's query responses, in query
//!   order, and registers them in the shadow send-tree
//!
//! Subtrees are taught one after another over the same connection.

mod receiver;
mod sender;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use reconnect_stream::Connection;
use tracing::{debug, info};

use crate::config::ReconnectConfig;
use crate::error::Result;
use crate::handoff::{subtree_name, SubtreeQueue, TeacherSubtree};
use crate::lesson::{Lesson, QueryResponse};
use crate::stats::{SessionReport, TeacherCounters, TeacherStats};
use crate::view::TeacherView;
use crate::work_group::{Interrupter, WorkGroup};

use receiver::ReceivingWorker;
use sender::SendingWorker;

/// Everything a teacher subtree job needs from its session.
#[derive(Clone)]
pub struct TeacherContext {
    pub(crate) name: String,
    pub(crate) connection: Connection,
    pub(crate) config: ReconnectConfig,
    pub(crate) interrupter: Interrupter,
    pub(crate) subtrees: SubtreeQueue<TeacherSubtree>,
}

/// Teach one subtree rooted at `root` and wait for both workers.
pub(crate) async fn teach_subtree<V: TeacherView>(
    ctx: TeacherContext,
    root: V::Node,
    view: V,
) -> Result<TeacherStats> {
    let view = Arc::new(view);
    view.add_to_handle_queue(root);

    let lessons = ctx.connection.output::<Lesson>();
    let responses = Arc::new(ctx.connection.input::<QueryResponse>());
    let finished = Arc::new(AtomicBool::new(false));
    let counters = Arc::new(TeacherCounters::default());

    let sending = SendingWorker {
        view: view.clone(),
        lessons,
        responses: responses.clone(),
        finished: finished.clone(),
        counters: counters.clone(),
        subtrees: ctx.subtrees.clone(),
    };
    let receiving = ReceivingWorker {
        view: view.clone(),
        responses,
        finished,
        counters: counters.clone(),
        idle_sleep: ctx.config.receiver_idle_sleep,
    };

    let mut group = WorkGroup::new(ctx.interrupter.clone());
    group.execute(format!("teacher-send {}", ctx.name), sending.run());
    group.execute(format!("teacher-receive {}", ctx.name), receiving.run());
    let result = group.join_all().await;
    view.close();
    result?;

    let stats = counters.snapshot();
    debug!(
        "taught {}: {} data lessons, {} up-to-date, {} forced",
        ctx.name,
        stats.data_lessons(),
        stats.up_to_date_lessons,
        stats.forced_sends
    );
    Ok(stats)
}

/// Drives the teacher side of a session over one connection.
pub struct TeachingSynchronizer {
    connection: Connection,
    config: ReconnectConfig,
    interrupter: Interrupter,
}

impl TeachingSynchronizer {
    pub fn new(connection: Connection, config: ReconnectConfig) -> Self {
        Self {
            connection,
            config,
            interrupter: Interrupter::new(),
        }
    }

    /// Handle for stopping the session from elsewhere.
    pub fn interrupter(&self) -> Interrupter {
        self.interrupter.clone()
    }

    /// Teach the tree under `root`, including every custom view subtree.
    pub async fn synchronize<V: TeacherView>(
        self,
        root: V::Node,
        view: V,
    ) -> Result<SessionReport<TeacherStats>> {
        let started = Instant::now();
        let subtrees = SubtreeQueue::new();
        subtrees.push(TeacherSubtree::new(root, view));
        info!("teaching session started");

        let mut report = SessionReport::default();
        let mut index = 0;
        while let Some(subtree) = subtrees.pop() {
            self.interrupter.check()?;
            let name = subtree_name(index);
            index += 1;

            let ctx = TeacherContext {
                name: name.clone(),
                connection: self.connection.clone(),
                config: self.config.clone(),
                interrupter: self.interrupter.clone(),
                subtrees: subtrees.clone(),
            };
            let stats = subtree.run(ctx).await?;
            report.record(name, stats);
        }

        info!(
            subtrees = report.subtrees.len(),
            data_lessons = report.totals.data_lessons(),
            up_to_date = report.totals.up_to_date_lessons,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "teaching session finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::hash::{ClassId, Hash};
    use crate::shadow::SendSchedule;
    use bytes::Bytes;
    use std::time::Duration;

    struct Node {
        name: &'static str,
        hash: Hash,
        children: Option<Vec<Arc<Node>>>,
    }

    fn leaf(name: &'static str, id: u8) -> Arc<Node> {
        Arc::new(Node {
            name,
            hash: Hash([id; 32]),
            children: None,
        })
    }

    fn internal(name: &'static str, id: u8, children: Vec<Arc<Node>>) -> Arc<Node> {
        Arc::new(Node {
            name,
            hash: Hash([id; 32]),
            children: Some(children),
        })
    }

    struct StaticView {
        schedule: SendSchedule<Arc<Node>>,
    }

    impl StaticView {
        fn new(max_ack_delay: Duration) -> Self {
            Self {
                schedule: SendSchedule::new(max_ack_delay),
            }
        }
    }

    impl TeacherView for StaticView {
        type Node = Arc<Node>;

        fn is_internal(&self, node: &Self::Node) -> bool {
            node.children.is_some()
        }

        fn child_count(&self, node: &Self::Node) -> usize {
            node.children.as_ref().map_or(0, Vec::len)
        }

        fn child(&self, node: &Self::Node, index: usize) -> Result<Self::Node> {
            node.children
                .as_ref()
                .and_then(|c| c.get(index).cloned())
                .ok_or_else(|| Error::view("no such child"))
        }

        fn child_hashes(&self, node: &Self::Node) -> Result<Vec<Hash>> {
            Ok(node
                .children
                .iter()
                .flatten()
                .map(|c| c.hash)
                .collect())
        }

        fn serialize_leaf(&self, node: &Self::Node) -> Result<Bytes> {
            Ok(Bytes::from_static(node.name.as_bytes()))
        }

        fn serialize_internal(&self, node: &Self::Node) -> Result<Bytes> {
            Ok(Bytes::from_static(node.name.as_bytes()))
        }

        fn class_id(&self, _node: &Self::Node) -> ClassId {
            ClassId(1)
        }

        fn is_custom_reconnect_root(&self, _node: &Self::Node) -> bool {
            false
        }

        fn custom_subtree(&self, node: &Self::Node) -> Result<TeacherSubtree> {
            Err(Error::UnknownCustomRoot(self.class_id(node)))
        }

        fn schedule(&self) -> &SendSchedule<Self::Node> {
            &self.schedule
        }
    }

    fn tree() -> Arc<Node> {
        internal(
            "root",
            1,
            vec![
                internal("a", 2, vec![leaf("a1", 3), leaf("a2", 4)]),
                leaf("b", 5),
            ],
        )
    }

    fn config(max_ack_delay: Duration) -> ReconnectConfig {
        ReconnectConfig::default()
            .with_max_ack_delay(max_ack_delay)
            .with_stream_timeout(Duration::from_secs(10))
    }

    async fn read_lessons(input: &reconnect_stream::AsyncInputStream<Lesson>, n: usize) -> Vec<Lesson> {
        for _ in 0..n {
            input.anticipate_message().unwrap();
        }
        let mut lessons = Vec::new();
        for _ in 0..n {
            lessons.push(input.read_anticipated_message().await.unwrap());
        }
        lessons
    }

    #[tokio::test]
    async fn test_confirmed_child_gets_up_to_date() {
        let delay = Duration::from_secs(5);
        let (teacher_conn, learner_conn) = Connection::duplex(64 * 1024, config(delay).stream_config());
        let teacher = TeachingSynchronizer::new(teacher_conn, config(delay));

        let learner = async move {
            let lessons = learner_conn.input::<Lesson>();
            let mut responses = learner_conn.output::<QueryResponse>();

            let root = read_lessons(&lessons, 1).await;
            assert_eq!(root[0].queries().len(), 2);
            responses.send_async(QueryResponse(true)).await.unwrap();
            responses.send_async(QueryResponse(false)).await.unwrap();

            let rest = read_lessons(&lessons, 2).await;
            responses.close().await.unwrap();
            lessons.close().await.unwrap();
            rest
        };

        let (report, rest) = tokio::join!(teacher.synchronize(tree(), StaticView::new(delay)), learner);
        let report = report.unwrap();

        assert_eq!(rest[0], Lesson::UpToDate);
        assert_eq!(rest[1], Lesson::LeafData(Bytes::from_static(b"b")));
        assert_eq!(report.subtrees.len(), 1);
        assert_eq!(report.totals.internal_lessons, 1);
        assert_eq!(report.totals.leaf_lessons, 1);
        assert_eq!(report.totals.up_to_date_lessons, 1);
        assert_eq!(report.totals.forced_sends, 0);
        assert_eq!(report.totals.positive_responses, 1);
    }

    #[tokio::test]
    async fn test_late_confirmation_cancels_pending_descendants() {
        let delay = Duration::from_millis(200);
        let (teacher_conn, learner_conn) = Connection::duplex(64 * 1024, config(delay).stream_config());
        let teacher = TeachingSynchronizer::new(teacher_conn, config(delay));

        let learner = async move {
            let lessons = learner_conn.input::<Lesson>();
            let mut responses = learner_conn.output::<QueryResponse>();

            // Stay silent until the teacher gives up waiting on a and b.
            let mut seen = read_lessons(&lessons, 3).await;
            assert_eq!(seen[1].queries().len(), 2);

            // a is present after all; the answers for a1 and a2 come too late
            // to matter.
            for present in [true, false, false, false] {
                responses.send_async(QueryResponse(present)).await.unwrap();
            }
            seen.extend(read_lessons(&lessons, 2).await);
            responses.close().await.unwrap();
            lessons.close().await.unwrap();
            seen
        };

        let (report, seen) = tokio::join!(teacher.synchronize(tree(), StaticView::new(delay)), learner);
        let report = report.unwrap();

        let kinds: Vec<_> = seen.iter().map(Lesson::kind).collect();
        assert_eq!(kinds, ["internal", "internal", "leaf", "up-to-date", "up-to-date"]);
        assert_eq!(report.totals.forced_sends, 2);
        assert_eq!(report.totals.up_to_date_lessons, 2);
        assert_eq!(report.totals.negative_responses, 3);
    }

    #[tokio::test]
    async fn test_interrupted_session_stops() {
        let delay = Duration::from_secs(30);
        let (teacher_conn, _learner_conn) = Connection::duplex(64 * 1024, config(delay).stream_config());
        let teacher = TeachingSynchronizer::new(teacher_conn, config(delay));
        let interrupter = teacher.interrupter();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            interrupter.interrupt();
        });

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            teacher.synchronize(tree(), StaticView::new(delay)),
        )
        .await
        .unwrap()
        .unwrap_err();
        assert!(err.is_interruption());
    }
}
