//! Teacher view over a [`MerkleNode`] tree.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reconnect_protocol::{ClassId, Hash, Result, SendSchedule, TeacherSubtree, TeacherView};

use crate::codec::encode_node;
use crate::error::Error;
use crate::node::NodeRef;
use crate::registry::CustomRootRegistry;

pub struct MerkleTeacherView {
    registry: Arc<CustomRootRegistry>,
    schedule: SendSchedule<NodeRef>,
}

impl MerkleTeacherView {
    pub fn new(registry: Arc<CustomRootRegistry>, max_ack_delay: Duration) -> Self {
        Self {
            registry,
            schedule: SendSchedule::new(max_ack_delay),
        }
    }
}

impl TeacherView for MerkleTeacherView {
    type Node = NodeRef;

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

    fn child_hashes(&self, node: &NodeRef) -> Result<Vec<Hash>> {
        Ok(node.children().iter().map(|c| c.hash()).collect())
    }

    fn serialize_leaf(&self, node: &NodeRef) -> Result<Bytes> {
        Ok(encode_node(node)?)
    }

    fn serialize_internal(&self, node: &NodeRef) -> Result<Bytes> {
        Ok(encode_node(node)?)
    }

    fn class_id(&self, node: &NodeRef) -> ClassId {
        node.class_id()
    }

    fn is_custom_reconnect_root(&self, node: &NodeRef) -> bool {
        node.is_internal() && self.registry.is_custom(node.class_id())
    }

    fn custom_subtree(&self, node: &NodeRef) -> Result<TeacherSubtree> {
        let view = MerkleTeacherView::new(self.registry.clone(), self.schedule.max_ack_delay());
        Ok(TeacherSubtree::new(node.clone(), view))
    }

    fn schedule(&self) -> &SendSchedule<NodeRef> {
        &self.schedule
    }
}
