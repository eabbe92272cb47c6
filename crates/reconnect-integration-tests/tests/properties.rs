//! Property tests: random trees, random stale learner copies.
//!
//! For every generated pair the learner must end with the teacher's tree,
//! and with responses arriving in time the number of data and up-to-date
//! lessons is fixed by which positions already match.

use std::time::Duration;

use proptest::prelude::*;
use reconnect_integration_tests::{
    expected_data_lessons, expected_up_to_date_lessons, patient_config, run_session,
};
use reconnect_merkle::{CustomRootRegistry, NodeRef, TreeGenerator};
use reconnect_protocol::ReconnectConfig;

/// Teacher tree plus the learner's starting tree.
#[derive(Debug, Clone)]
struct TreePair {
    seed: u64,
    nodes: usize,
    mutations: usize,
    learner: LearnerStart,
}

#[derive(Debug, Clone, Copy)]
enum LearnerStart {
    Empty,
    /// An older version of the teacher's tree.
    Stale,
    /// A tree generated independently of the teacher's.
    Unrelated,
}

impl TreePair {
    fn build(&self) -> (NodeRef, Option<NodeRef>) {
        let mut generator = TreeGenerator::new(self.seed);
        let stale = generator.tree(self.nodes);
        let fresh = generator.mutate(&stale, self.mutations);
        let learner = match self.learner {
            LearnerStart::Empty => None,
            LearnerStart::Stale => Some(stale),
            LearnerStart::Unrelated => Some(TreeGenerator::new(self.seed ^ 0xffff).tree(self.nodes)),
        };
        (fresh, learner)
    }
}

fn arb_tree_pair() -> impl Strategy<Value = TreePair> {
    (
        any::<u64>(),
        1usize..160,
        0usize..12,
        prop_oneof![
            Just(LearnerStart::Empty),
            Just(LearnerStart::Stale),
            Just(LearnerStart::Unrelated),
        ],
    )
        .prop_map(|(seed, nodes, mutations, learner)| TreePair {
            seed,
            nodes,
            mutations,
            learner,
        })
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn learner_converges_and_skips_matching_positions(pair in arb_tree_pair()) {
        let (teacher_root, learner_root) = pair.build();
        let expected_data = expected_data_lessons(&teacher_root, learner_root.as_ref());
        let expected_up_to_date = expected_up_to_date_lessons(&teacher_root, learner_root.as_ref());

        let results = block_on(run_session(
            teacher_root.clone(),
            learner_root,
            CustomRootRegistry::new(),
            patient_config(),
        ));
        let teacher = results.teacher.unwrap();
        let learned = results.learner.unwrap();

        prop_assert!(learned.root.content_eq(&teacher_root));
        prop_assert_eq!(learned.root.hash(), teacher_root.hash());
        prop_assert_eq!(teacher.totals.forced_sends, 0);
        prop_assert_eq!(teacher.totals.data_lessons(), expected_data);
        prop_assert_eq!(teacher.totals.up_to_date_lessons, expected_up_to_date);
        prop_assert_eq!(learned.report.totals.total(), expected_data);
        prop_assert_eq!(learned.report.totals.redundant(), 0);
    }

    #[test]
    fn learner_converges_without_waiting_for_responses(pair in arb_tree_pair()) {
        let (teacher_root, learner_root) = pair.build();
        let config = ReconnectConfig::default()
            .with_max_ack_delay(Duration::ZERO)
            .with_stream_timeout(Duration::from_secs(10));

        let results = block_on(run_session(
            teacher_root.clone(),
            learner_root.clone(),
            CustomRootRegistry::new(),
            config,
        ));
        let teacher = results.teacher.unwrap();
        let learned = results.learner.unwrap();

        prop_assert_eq!(learned.root.hash(), teacher_root.hash());
        // Without waiting, at least every node that had to be sent was sent.
        prop_assert!(
            teacher.totals.data_lessons() >= expected_data_lessons(&teacher_root, learner_root.as_ref())
        );
    }
}
