//! Learner view that rebuilds a [`MerkleNode`] tree.

use std::sync::Arc;

use bytes::Bytes;
use reconnect_protocol::{
    ClassId, Error as ProtocolError, ExpectationQueue, Hash, LearnerSubtree, LearnerView, Result,
};
use tracing::{debug, trace};

use crate::codec::decode_record;
use crate::error::Error;
use crate::node::{MerkleNode, NodeRef};
use crate::registry::CustomRootRegistry;

pub struct MerkleLearnerView {
    original_root: Option<NodeRef>,
    registry: Arc<CustomRootRegistry>,
    root_of_state: bool,
    root: Option<NodeRef>,
    expectations: ExpectationQueue<NodeRef>,
    /// Internal nodes with their final child counts, in arrival order.
    marked: Vec<(NodeRef, usize)>,
}

impl MerkleLearnerView {
    /// View for the whole state. `original_root` is the learner's current
    /// tree, if it has one.
    pub fn new(original_root: Option<NodeRef>, registry: Arc<CustomRootRegistry>) -> Self {
        Self {
            original_root,
            registry,
            root_of_state: true,
            root: None,
            expectations: ExpectationQueue::new(),
            marked: Vec::new(),
        }
    }

    /// View for a custom subtree whose root was already placed in the
    /// parent tree.
    fn nested(root: NodeRef, registry: Arc<CustomRootRegistry>) -> Self {
        Self {
            original_root: Some(root),
            root_of_state: false,
            ..Self::new(None, registry)
        }
    }
}

impl LearnerView for MerkleLearnerView {
    type Node = NodeRef;

    fn original_root(&self) -> Option<NodeRef> {
        self.original_root.clone()
    }

    fn expectations(&mut self) -> &mut ExpectationQueue<NodeRef> {
        &mut self.expectations
    }

    fn is_root_of_state(&self) -> bool {
        self.root_of_state
    }

    fn deserialize_leaf(&mut self, data: Bytes) -> Result<NodeRef> {
        let record = decode_record(&data)?;
        Ok(MerkleNode::leaf(record.class_id(), record.data))
    }

    fn deserialize_internal(&mut self, data: Bytes) -> Result<NodeRef> {
        let record = decode_record(&data)?;
        Ok(MerkleNode::unhashed_internal(record.class_id(), record.data, Vec::new()))
    }

    fn mark_for_reinit(&mut self, node: &NodeRef, child_count: usize) {
        self.marked.push((node.clone(), child_count));
    }

    fn is_internal(&self, node: &NodeRef) -> bool {
        node.is_internal()
    }

    fn child_count(&self, node: &NodeRef) -> usize {
        node.child_count()
    }

    fn child(&self, node: &NodeRef, index: usize) -> Result<NodeRef> {
        node.child(index).ok_or_else(|| {
            Error::ChildIndex {
                index,
                len: node.child_count(),
            }
            .into()
        })
    }

    fn node_hash(&self, node: &NodeRef) -> Option<Hash> {
        node.cached_hash()
    }

    fn set_child(&mut self, parent: &NodeRef, index: usize, child: NodeRef) -> Result<()> {
        Ok(parent.set_child(index, child)?)
    }

    fn set_root(&mut self, root: NodeRef) {
        self.root = Some(root);
    }

    fn root(&self) -> Option<NodeRef> {
        self.root.clone()
    }

    fn materialize_custom_root(
        &mut self,
        class: ClassId,
        original: Option<&NodeRef>,
    ) -> Result<(NodeRef, LearnerSubtree)> {
        if !self.registry.is_custom(class) {
            return Err(ProtocolError::UnknownCustomRoot(class));
        }

        // Seed from the old node so its children can still be matched by hash.
        let root = match original {
            Some(node) if node.is_internal() && node.class_id() == class => {
                debug!(
                    class = class.0,
                    children = node.child_count(),
                    "seeding custom root from original"
                );
                node.shallow_copy()
            }
            Some(node) => {
                debug!(
                    class = class.0,
                    original_class = node.class_id().0,
                    "original differs, starting empty custom root"
                );
                MerkleNode::unhashed_container(class)
            }
            None => {
                debug!(class = class.0, "no original, starting empty custom root");
                MerkleNode::unhashed_container(class)
            }
        };
        let nested = MerkleLearnerView::nested(root.clone(), self.registry.clone());
        Ok((root, LearnerSubtree::new(nested)))
    }

    fn initialize(&mut self) -> Result<()> {
        trace!(marked = self.marked.len(), "rebuilding learned internal nodes");
        // Children were marked after their parents.
        for (node, child_count) in self.marked.drain(..).rev() {
            node.truncate_children(child_count);
            node.rehash();
        }
        Ok(())
    }
}
