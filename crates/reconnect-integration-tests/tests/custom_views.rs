//! Custom view subtrees, including custom roots nested in custom subtrees.

use reconnect_integration_tests::{patient_config, run_session};
use reconnect_merkle::{CustomRootRegistry, MerkleNode, NodeRef, TreeGenerator, INTERNAL_CLASS, LEAF_CLASS};
use reconnect_protocol::{ClassId, Error};

const CUSTOM: ClassId = ClassId(0xc0de);

fn leaf(data: &'static str) -> NodeRef {
    MerkleNode::leaf(LEAF_CLASS, data)
}

/// root -> [a, outer -> [b, inner -> [c, d]]], both containers custom.
fn nested_tree(c: &'static str) -> NodeRef {
    let inner = MerkleNode::container(CUSTOM, vec![leaf(c), leaf("d")]);
    let outer = MerkleNode::container(CUSTOM, vec![leaf("b"), inner]);
    MerkleNode::internal(INTERNAL_CLASS, "root", vec![leaf("a"), outer])
}

fn custom_registry() -> CustomRootRegistry {
    CustomRootRegistry::new().with_class(CUSTOM)
}

#[tokio::test]
async fn nested_custom_roots_each_get_a_subtree() {
    let teacher_root = nested_tree("c");

    let results = run_session(teacher_root.clone(), None, custom_registry(), patient_config()).await;
    let teacher = results.teacher.unwrap();
    let learned = results.learner.unwrap();

    let names: Vec<_> = teacher.subtrees.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["root", "subtree-1", "subtree-2"]);
    assert_eq!(teacher.totals.custom_view_roots, 2);

    let learner_names: Vec<_> = learned.report.subtrees.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(learner_names, names);
    assert_eq!(learned.report.totals.total(), teacher_root.subtree_size() as u64);
    assert!(learned.root.content_eq(&teacher_root));
}

#[tokio::test]
async fn change_deep_inside_nested_subtree_is_found() {
    let stale = nested_tree("c");
    let fresh = nested_tree("c2");

    let results = run_session(fresh.clone(), Some(stale.clone()), custom_registry(), patient_config()).await;
    let teacher = results.teacher.unwrap();
    let learned = results.learner.unwrap();

    assert_eq!(learned.root.hash(), fresh.hash());
    // a, b and d are reused. Only the changed leaf carries data below the roots.
    assert_eq!(teacher.totals.up_to_date_lessons, 3);
    assert_eq!(teacher.totals.leaf_lessons, 1);
    // The learner's old nodes are reused, not copied.
    let outer = learned.root.child(1).unwrap();
    assert!(std::sync::Arc::ptr_eq(
        &outer.child(0).unwrap(),
        &stale.child(1).unwrap().child(0).unwrap()
    ));
}

#[tokio::test]
async fn nesting_matches_flattened_sync() {
    let mut generator = TreeGenerator::new(31).with_custom_class(CUSTOM, 0.35);
    let teacher_root = generator.tree(250);

    let nested = run_session(teacher_root.clone(), None, custom_registry(), patient_config()).await;
    let flat = run_session(teacher_root.clone(), None, CustomRootRegistry::new(), patient_config()).await;
    let nested_teacher = nested.teacher.unwrap();
    let flat_teacher = flat.teacher.unwrap();
    let nested = nested.learner.unwrap();
    let flat = flat.learner.unwrap();

    assert!(nested_teacher.subtrees.len() > 1);
    assert_eq!(flat_teacher.subtrees.len(), 1);
    assert_eq!(nested.root.hash(), flat.root.hash());
    assert!(nested.root.content_eq(&flat.root));
    assert_eq!(nested.report.totals.total(), flat.report.totals.total());
}

#[tokio::test]
async fn nesting_matches_flattened_sync_from_stale_tree() {
    let mut generator = TreeGenerator::new(32).with_custom_class(CUSTOM, 0.35);
    let stale = generator.tree(250);
    let fresh = generator.mutate(&stale, 15);

    let nested = run_session(fresh.clone(), Some(stale.clone()), custom_registry(), patient_config()).await;
    let flat = run_session(fresh.clone(), Some(stale), CustomRootRegistry::new(), patient_config()).await;
    nested.teacher.unwrap();
    flat.teacher.unwrap();

    let nested = nested.learner.unwrap().root;
    let flat = flat.learner.unwrap().root;
    assert_eq!(nested.hash(), fresh.hash());
    assert_eq!(flat.hash(), fresh.hash());
}

#[tokio::test]
async fn learner_rejects_unregistered_custom_class() {
    let teacher_root = nested_tree("c");

    // Only the teacher treats CUSTOM as a custom root.
    let config = patient_config().with_stream_timeout(std::time::Duration::from_secs(2));
    let (teacher_conn, learner_conn) = reconnect_stream::Connection::duplex(1 << 16, config.stream_config());
    let teacher = reconnect_protocol::TeachingSynchronizer::new(teacher_conn, config.clone());
    let learner = reconnect_protocol::LearningSynchronizer::new(learner_conn, config.clone());
    let (taught, learned) = tokio::join!(
        teacher.synchronize(
            teacher_root,
            reconnect_merkle::MerkleTeacherView::new(std::sync::Arc::new(custom_registry()), config.max_ack_delay)
        ),
        learner.synchronize(reconnect_merkle::MerkleLearnerView::new(
            None,
            std::sync::Arc::new(CustomRootRegistry::new())
        )),
    );

    assert!(matches!(learned, Err(Error::UnknownCustomRoot(CUSTOM))));
    assert!(taught.is_err());
}
