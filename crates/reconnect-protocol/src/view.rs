//! Tree views: the only contract between the protocol and a tree store.
//!
//! The teacher reads its tree through a [`TeacherView`], the learner builds
//! the new tree through a [`LearnerView`]. Any backing store implementing
//! both can serve as the representation of a custom view subtree.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::expectation::{ExpectationQueue, ExpectedLesson};
use crate::handoff::{LearnerSubtree, TeacherSubtree};
use crate::hash::{ClassId, Hash};
use crate::shadow::{NodeToSend, SendSchedule};

/// Shadow entry for a teacher node.
pub type SendEntry<N> = Arc<NodeToSend<N>>;

/// Read access to the teacher's tree plus its send bookkeeping.
///
/// Implementors supply the navigation and serialization methods and own a
/// [`SendSchedule`]. The queue and response methods are provided on top of
/// that schedule.
pub trait TeacherView: Send + Sync + 'static {
    type Node: Clone + Send + Sync + 'static;

    fn is_internal(&self, node: &Self::Node) -> bool;

    fn child_count(&self, node: &Self::Node) -> usize;

    fn child(&self, node: &Self::Node, index: usize) -> Result<Self::Node>;

    /// Hashes of all children, in child order.
    fn child_hashes(&self, node: &Self::Node) -> Result<Vec<Hash>>;

    fn serialize_leaf(&self, node: &Self::Node) -> Result<Bytes>;

    /// Serialize an internal node's own content, without its children.
    fn serialize_internal(&self, node: &Self::Node) -> Result<Bytes>;

    fn class_id(&self, node: &Self::Node) -> ClassId;

    /// Whether `node` roots a subtree synchronized through its own view.
    fn is_custom_reconnect_root(&self, node: &Self::Node) -> bool;

    /// Build the nested teacher job for a custom reconnect root.
    fn custom_subtree(&self, node: &Self::Node) -> Result<TeacherSubtree>;

    fn schedule(&self) -> &SendSchedule<Self::Node>;

    /// Queue the subtree root.
    fn add_to_handle_queue(&self, node: Self::Node) {
        let internal = self.is_internal(&node);
        self.schedule().push_root(node, internal);
    }

    fn next_node_to_handle(&self) -> Option<SendEntry<Self::Node>> {
        self.schedule().next_to_handle()
    }

    fn are_there_nodes_to_handle(&self) -> bool {
        self.schedule().has_nodes_to_handle()
    }

    /// Fetch child `index` of `parent` and register it as both a node to
    /// send and a node awaiting a query response.
    fn child_and_prepare_for_query_response(
        &self,
        parent: &SendEntry<Self::Node>,
        index: usize,
    ) -> Result<SendEntry<Self::Node>> {
        let child = self.child(parent.node(), index)?;
        let internal = self.is_internal(&child);
        Ok(self.schedule().push_child(parent, child, internal))
    }

    /// The node the next query response refers to.
    fn node_for_next_response(&self) -> Result<SendEntry<Self::Node>> {
        self.schedule()
            .next_awaiting_response()
            .ok_or(Error::UnexpectedResponse)
    }

    fn is_response_expected(&self) -> bool {
        self.schedule().is_response_expected()
    }

    fn register_response_for_node(&self, entry: &SendEntry<Self::Node>, learner_has_node: bool) {
        entry.register_response(learner_has_node);
    }

    fn has_learner_confirmed_for(&self, entry: &SendEntry<Self::Node>) -> bool {
        entry.has_response_status()
    }

    /// Release send bookkeeping once the subtree is done.
    fn close(&self) {
        self.schedule().clear();
    }
}

/// Write access to the learner's tree under reconstruction.
///
/// A learner view is owned by exactly one worker for the whole subtree.
pub trait LearnerView: Send + 'static {
    type Node: Clone + Send + Sync + 'static;

    /// The learner's pre-existing node at this subtree's root position.
    fn original_root(&self) -> Option<Self::Node>;

    fn expectations(&mut self) -> &mut ExpectationQueue<Self::Node>;

    /// Whether this view covers the root of the whole state rather than a
    /// nested subtree.
    fn is_root_of_state(&self) -> bool;

    fn deserialize_leaf(&mut self, data: Bytes) -> Result<Self::Node>;

    /// Build an internal node from its content. Children are attached later.
    fn deserialize_internal(&mut self, data: Bytes) -> Result<Self::Node>;

    /// Remember that `node` must be rebuilt once its `child_count` children
    /// are attached.
    fn mark_for_reinit(&mut self, node: &Self::Node, child_count: usize);

    fn is_internal(&self, node: &Self::Node) -> bool;

    fn child_count(&self, node: &Self::Node) -> usize;

    fn child(&self, node: &Self::Node, index: usize) -> Result<Self::Node>;

    /// Content hash of a node the learner already had, if known.
    fn node_hash(&self, node: &Self::Node) -> Option<Hash>;

    fn set_child(&mut self, parent: &Self::Node, index: usize, child: Self::Node) -> Result<()>;

    fn set_root(&mut self, root: Self::Node);

    /// The reconstructed root, once the first lesson has been applied.
    fn root(&self) -> Option<Self::Node>;

    /// Create the root of a custom view subtree of class `class` together
    /// with the nested learner job that fills it in.
    ///
    /// `original` is the learner's node at this position; implementations
    /// seed the new root from it when it has the same class.
    fn materialize_custom_root(
        &mut self,
        class: ClassId,
        original: Option<&Self::Node>,
    ) -> Result<(Self::Node, LearnerSubtree)>;

    /// Rebuild every node marked for re-initialization.
    fn initialize(&mut self) -> Result<()>;

    fn close(&mut self) {
        self.expectations().clear();
    }

    fn expect_lesson_for(
        &mut self,
        parent: Option<Self::Node>,
        position: usize,
        original: Option<Self::Node>,
        already_present: bool,
    ) {
        self.expectations()
            .expect(parent, position, original, already_present);
    }

    fn next_expected_lesson(&mut self) -> Option<ExpectedLesson<Self::Node>> {
        self.expectations().next()
    }

    fn has_expected_lessons(&mut self) -> bool {
        !self.expectations().is_empty()
    }
}
