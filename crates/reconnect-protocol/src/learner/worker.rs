use std::sync::Arc;

use reconnect_stream::{AsyncInputStream, AsyncOutputStream};
use tracing::trace;

use crate::error::{Error, Result};
use crate::expectation::ExpectedLesson;
use crate::handoff::{LearnerSubtree, SubtreeQueue};
use crate::hash::Hash;
use crate::lesson::{Lesson, QueryResponse};
use crate::rate_limit::RateLimitedWarning;
use crate::stats::ReconnectNodeCount;
use crate::view::LearnerView;

use super::Learned;

pub(super) struct LearnerWorker<V: LearnerView> {
    pub(super) name: String,
    pub(super) view: V,
    pub(super) lessons: AsyncInputStream<Lesson>,
    pub(super) responses: AsyncOutputStream<QueryResponse>,
    pub(super) subtrees: SubtreeQueue<LearnerSubtree>,
    pub(super) warnings: Arc<RateLimitedWarning>,
    pub(super) strict_hash_checks: bool,
}

impl<V: LearnerView> LearnerWorker<V> {
    pub(super) async fn run(mut self) -> Result<Learned<V>> {
        let result = self.receive_lessons().await;
        let responses_closed = self.responses.close().await;
        let lessons_closed = self.lessons.close().await;
        let counts = result?;
        responses_closed?;
        lessons_closed?;

        let root = self.view.root();
        Ok(Learned {
            view: self.view,
            root,
            counts,
        })
    }

    async fn receive_lessons(&mut self) -> Result<ReconnectNodeCount> {
        let original_root = self.view.original_root();
        self.view.expect_lesson_for(None, 0, original_root, false);
        self.lessons.anticipate_message()?;

        let mut counts = ReconnectNodeCount::default();
        let mut first = true;
        while let Some(expected) = self.view.next_expected_lesson() {
            let lesson = self.lessons.read_anticipated_message().await?;
            trace!(kind = lesson.kind(), position = expected.position, "received lesson");

            let node = self.resolve(&expected, &lesson, first)?;
            first = false;

            match &expected.parent {
                None => self.view.set_root(node.clone()),
                Some(parent) => self.view.set_child(parent, expected.position, node.clone())?,
            }

            match &lesson {
                Lesson::LeafData(_) => counts.record_leaf(expected.already_present),
                Lesson::InternalData { queries, .. } => {
                    counts.record_internal(expected.already_present);
                    self.answer_queries(&expected, &node, queries).await?;
                }
                Lesson::UpToDate | Lesson::CustomViewRoot(_) => {}
            }
        }
        Ok(counts)
    }

    /// The node that belongs at the expected position.
    fn resolve(&mut self, expected: &ExpectedLesson<V::Node>, lesson: &Lesson, first: bool) -> Result<V::Node> {
        // The root of a nested subtree was already placed by the parent session.
        let reuse_original = first && !self.view.is_root_of_state();

        match lesson {
            Lesson::UpToDate => expected.original.clone().ok_or_else(|| {
                Error::sync(format!(
                    "up-to-date lesson at position {} where the learner has no node",
                    expected.position
                ))
            }),
            Lesson::CustomViewRoot(class) => {
                let (node, subtree) = self
                    .view
                    .materialize_custom_root(*class, expected.original.as_ref())?;
                self.subtrees.push(subtree);
                Ok(node)
            }
            Lesson::LeafData(data) => {
                if reuse_original {
                    self.original_subtree_root(expected)
                } else {
                    self.view.deserialize_leaf(data.clone())
                }
            }
            Lesson::InternalData { data, queries } => {
                let node = if reuse_original {
                    self.original_subtree_root(expected)?
                } else {
                    self.view.deserialize_internal(data.clone())?
                };
                self.view.mark_for_reinit(&node, queries.len());
                Ok(node)
            }
        }
    }

    fn original_subtree_root(&self, expected: &ExpectedLesson<V::Node>) -> Result<V::Node> {
        expected
            .original
            .clone()
            .ok_or_else(|| Error::sync(format!("subtree {} has no root to fill", self.name)))
    }

    /// Answer every child query of `node` and expect a lesson per child.
    async fn answer_queries(
        &mut self,
        expected: &ExpectedLesson<V::Node>,
        node: &V::Node,
        queries: &[Hash],
    ) -> Result<()> {
        for (index, query) in queries.iter().enumerate() {
            let original_child = match &expected.original {
                Some(original)
                    if self.view.is_internal(original) && self.view.child_count(original) > index =>
                {
                    Some(self.view.child(original, index)?)
                }
                _ => None,
            };

            let already_present = match &original_child {
                Some(child) => self.matches_query(child, query, index)?,
                None => false,
            };

            self.lessons.anticipate_message()?;
            self.view
                .expect_lesson_for(Some(node.clone()), index, original_child, already_present);
            self.responses.send_async(QueryResponse(already_present)).await?;
        }
        Ok(())
    }

    fn matches_query(&self, child: &V::Node, query: &Hash, index: usize) -> Result<bool> {
        match self.view.node_hash(child) {
            Some(hash) => Ok(hash == *query),
            None if self.strict_hash_checks => Err(Error::MissingHash { child_index: index }),
            None => {
                self.warnings.warn(format_args!(
                    "original child {} in subtree {} has no hash, answering not present",
                    index, self.name
                ));
                Ok(false)
            }
        }
    }
}
