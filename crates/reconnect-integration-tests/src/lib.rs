//! Shared harness for cross-crate reconnect tests.
//!
//! Runs a teacher and a learner over an in-process pipe and hands back both
//! sides' results, so tests can check the learned tree and the counters.

use std::sync::Arc;
use std::time::Duration;

use reconnect_merkle::{CustomRootRegistry, MerkleLearnerView, MerkleTeacherView, NodeRef};
use reconnect_protocol::{
    LearnerOutcome, LearningSynchronizer, ReconnectConfig, Result, SessionReport, TeacherStats,
    TeachingSynchronizer,
};
use reconnect_stream::Connection;

const PIPE_BUFFER: usize = 64 * 1024;

/// Install a test subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reconnect=warn".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Configuration under which every response arrives well before its
/// deadline, so counts are deterministic.
pub fn patient_config() -> ReconnectConfig {
    ReconnectConfig::default()
        .with_max_ack_delay(Duration::from_secs(5))
        .with_stream_timeout(Duration::from_secs(10))
}

/// Both sides of one finished session.
pub struct SessionResults {
    pub teacher: Result<SessionReport<TeacherStats>>,
    pub learner: Result<LearnerOutcome<NodeRef>>,
}

/// Synchronize `learner_root` towards `teacher_root`.
pub async fn run_session(
    teacher_root: NodeRef,
    learner_root: Option<NodeRef>,
    registry: CustomRootRegistry,
    config: ReconnectConfig,
) -> SessionResults {
    init_tracing();
    let (teacher_conn, learner_conn) = Connection::duplex(PIPE_BUFFER, config.stream_config());
    let registry = Arc::new(registry);

    let teacher = TeachingSynchronizer::new(teacher_conn, config.clone());
    let learner = LearningSynchronizer::new(learner_conn, config.clone());
    let (teacher, learner) = tokio::join!(
        teacher.synchronize(
            teacher_root,
            MerkleTeacherView::new(registry.clone(), config.max_ack_delay)
        ),
        learner.synchronize(MerkleLearnerView::new(learner_root, registry)),
    );
    SessionResults { teacher, learner }
}

/// Data lessons a session must send when no response times out and no
/// custom roots are involved.
///
/// The root is always sent. A child is skipped when the learner's node at
/// the same position has the same hash; otherwise it is sent and its own
/// children are compared against that positional node.
pub fn expected_data_lessons(teacher: &NodeRef, learner: Option<&NodeRef>) -> u64 {
    let mut count = 1;
    for (index, child) in teacher.children().iter().enumerate() {
        let original = learner
            .filter(|node| node.is_internal())
            .and_then(|node| node.child(index));
        match &original {
            Some(node) if node.hash() == child.hash() => {}
            _ => count += expected_data_lessons(child, original.as_ref()),
        }
    }
    count
}

/// Up-to-date lessons under the same assumptions as
/// [`expected_data_lessons`].
pub fn expected_up_to_date_lessons(teacher: &NodeRef, learner: Option<&NodeRef>) -> u64 {
    let mut count = 0;
    for (index, child) in teacher.children().iter().enumerate() {
        let original = learner
            .filter(|node| node.is_internal())
            .and_then(|node| node.child(index));
        match &original {
            Some(node) if node.hash() == child.hash() => count += 1,
            _ => count += expected_up_to_date_lessons(child, original.as_ref()),
        }
    }
    count
}
