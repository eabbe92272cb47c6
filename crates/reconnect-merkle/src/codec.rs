//! Node payload encoding.
//!
//! Lessons carry a node's own content only: its class id and payload, as a
//! bincode record. Children travel as separate lessons.

use bytes::Bytes;
use reconnect_protocol::ClassId;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::node::MerkleNode;

/// A node's own content as carried in a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub class_id: u64,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

impl NodeRecord {
    pub fn class_id(&self) -> ClassId {
        ClassId(self.class_id)
    }
}

/// Encode a node's own content.
pub fn encode_node(node: &MerkleNode) -> Result<Bytes> {
    let record = NodeRecord {
        class_id: node.class_id().0,
        data: node.data().to_vec(),
    };
    Ok(Bytes::from(bincode::serialize(&record)?))
}

/// Decode a record produced by [`encode_node`].
pub fn decode_record(bytes: &[u8]) -> Result<NodeRecord> {
    Ok(bincode::deserialize(bytes)?)
}
