//! Session failures: hash anomalies and interruption.

use std::sync::Arc;
use std::time::Duration;

use reconnect_integration_tests::{patient_config, run_session};
use reconnect_merkle::{
    CustomRootRegistry, MerkleLearnerView, MerkleNode, MerkleTeacherView, NodeRef, TreeGenerator, INTERNAL_CLASS,
    LEAF_CLASS,
};
use reconnect_protocol::{Error, LearningSynchronizer, TeachingSynchronizer};
use reconnect_stream::Connection;

/// A learner tree whose nodes never had their hashes computed.
fn unhashed_learner_tree() -> NodeRef {
    MerkleNode::unhashed_internal(
        INTERNAL_CLASS,
        "root",
        vec![
            MerkleNode::unhashed_leaf(LEAF_CLASS, "a"),
            MerkleNode::unhashed_leaf(LEAF_CLASS, "b"),
        ],
    )
}

fn teacher_tree() -> NodeRef {
    MerkleNode::internal(
        INTERNAL_CLASS,
        "root",
        vec![MerkleNode::leaf(LEAF_CLASS, "a"), MerkleNode::leaf(LEAF_CLASS, "b2")],
    )
}

#[tokio::test]
async fn missing_hash_is_answered_as_not_present() {
    let teacher_root = teacher_tree();

    let results = run_session(
        teacher_root.clone(),
        Some(unhashed_learner_tree()),
        CustomRootRegistry::new(),
        patient_config(),
    )
    .await;
    let teacher = results.teacher.unwrap();
    let learned = results.learner.unwrap();

    // Even the unchanged child is resent, since it could not be matched.
    assert_eq!(teacher.totals.negative_responses, 2);
    assert_eq!(teacher.totals.leaf_lessons, 2);
    assert_eq!(learned.root.hash(), teacher_root.hash());
}

#[tokio::test]
async fn missing_hash_fails_session_in_strict_mode() {
    let config = patient_config()
        .with_strict_hash_checks(true)
        .with_stream_timeout(Duration::from_secs(2));

    let results = run_session(
        teacher_tree(),
        Some(unhashed_learner_tree()),
        CustomRootRegistry::new(),
        config,
    )
    .await;

    assert!(matches!(
        results.learner,
        Err(Error::MissingHash { child_index: 0 })
    ));
    let teacher = results.teacher.unwrap_err();
    assert!(!teacher.is_interruption());
}

#[tokio::test]
async fn interrupted_teacher_stops_both_sides() {
    let config = patient_config().with_stream_timeout(Duration::from_secs(2));
    let registry = Arc::new(CustomRootRegistry::new());
    let tree = TreeGenerator::new(41).tree(50);

    let (teacher_conn, learner_conn) = Connection::duplex(1 << 16, config.stream_config());
    let teacher = TeachingSynchronizer::new(teacher_conn, config.clone());
    let learner = LearningSynchronizer::new(learner_conn, config.clone());
    teacher.interrupter().interrupt();

    let (taught, learned) = tokio::join!(
        teacher.synchronize(tree, MerkleTeacherView::new(registry.clone(), config.max_ack_delay)),
        learner.synchronize(MerkleLearnerView::new(None, registry)),
    );

    assert!(taught.unwrap_err().is_interruption());
    let learner_error = learned.unwrap_err();
    assert!(!learner_error.is_interruption());
}

#[tokio::test]
async fn interrupted_learner_reports_interruption() {
    let config = patient_config().with_stream_timeout(Duration::from_secs(2));
    let registry = Arc::new(CustomRootRegistry::new());
    let tree = TreeGenerator::new(42).tree(50);

    let (teacher_conn, learner_conn) = Connection::duplex(1 << 16, config.stream_config());
    let teacher = TeachingSynchronizer::new(teacher_conn, config.clone());
    let learner = LearningSynchronizer::new(learner_conn, config.clone());
    let interrupter = learner.interrupter();
    interrupter.interrupt();

    let (taught, learned) = tokio::join!(
        teacher.synchronize(tree, MerkleTeacherView::new(registry.clone(), config.max_ack_delay)),
        learner.synchronize(MerkleLearnerView::new(None, registry)),
    );

    assert!(learned.unwrap_err().is_interruption());
    assert!(taught.is_err());
}
