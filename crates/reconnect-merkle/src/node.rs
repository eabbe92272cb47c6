//! Hash-linked tree nodes.
//!
//! A node's hash covers its class, kind, payload and the hashes of its
//! children, so equal hashes mean equal subtrees. Hashes are cached and
//! recomputed on demand after a node's children change.

use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use reconnect_protocol::{ClassId, Hash};

use crate::error::{Error, Result};

/// Shared handle to a node.
pub type NodeRef = Arc<MerkleNode>;

const KIND_LEAF: u8 = 0;
const KIND_INTERNAL: u8 = 1;

#[derive(Debug)]
enum Body {
    Leaf,
    Internal(RwLock<Vec<NodeRef>>),
}

/// A node of an in-memory hash-linked tree.
#[derive(Debug)]
pub struct MerkleNode {
    class_id: ClassId,
    data: Bytes,
    body: Body,
    hash: RwLock<Option<Hash>>,
}

impl MerkleNode {
    /// A leaf with its hash computed.
    pub fn leaf(class_id: ClassId, data: impl Into<Bytes>) -> NodeRef {
        let node = Self::unhashed_leaf(class_id, data);
        node.hash();
        node
    }

    /// An internal node with its hash computed.
    pub fn internal(class_id: ClassId, data: impl Into<Bytes>, children: Vec<NodeRef>) -> NodeRef {
        let node = Self::unhashed_internal(class_id, data, children);
        node.hash();
        node
    }

    /// An internal node without payload of its own.
    pub fn container(class_id: ClassId, children: Vec<NodeRef>) -> NodeRef {
        Self::internal(class_id, Bytes::new(), children)
    }

    pub fn unhashed_leaf(class_id: ClassId, data: impl Into<Bytes>) -> NodeRef {
        Arc::new(Self {
            class_id,
            data: data.into(),
            body: Body::Leaf,
            hash: RwLock::new(None),
        })
    }

    pub fn unhashed_internal(class_id: ClassId, data: impl Into<Bytes>, children: Vec<NodeRef>) -> NodeRef {
        Arc::new(Self {
            class_id,
            data: data.into(),
            body: Body::Internal(RwLock::new(children)),
            hash: RwLock::new(None),
        })
    }

    pub fn unhashed_container(class_id: ClassId) -> NodeRef {
        Self::unhashed_internal(class_id, Bytes::new(), Vec::new())
    }

    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn is_internal(&self) -> bool {
        matches!(self.body, Body::Internal(_))
    }

    pub fn child_count(&self) -> usize {
        match &self.body {
            Body::Leaf => 0,
            Body::Internal(children) => children.read().unwrap_or_else(PoisonError::into_inner).len(),
        }
    }

    pub fn child(&self, index: usize) -> Option<NodeRef> {
        match &self.body {
            Body::Leaf => None,
            Body::Internal(children) => children
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(index)
                .cloned(),
        }
    }

    /// Snapshot of the child list. Empty for leaves.
    pub fn children(&self) -> Vec<NodeRef> {
        match &self.body {
            Body::Leaf => Vec::new(),
            Body::Internal(children) => children.read().unwrap_or_else(PoisonError::into_inner).clone(),
        }
    }

    /// The cached hash, without computing anything.
    pub fn cached_hash(&self) -> Option<Hash> {
        *self.hash.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// The node's hash, computing and caching it (and any missing child
    /// hashes) if needed.
    pub fn hash(&self) -> Hash {
        if let Some(hash) = self.cached_hash() {
            return hash;
        }
        self.rehash()
    }

    /// Recompute this node's hash from its current children.
    pub fn rehash(&self) -> Hash {
        let child_hashes: Vec<Hash> = self.children().iter().map(|c| c.hash()).collect();
        let hash = compute_hash(self.class_id, self.is_internal(), &self.data, &child_hashes);
        *self.hash.write().unwrap_or_else(PoisonError::into_inner) = Some(hash);
        hash
    }

    /// Put `child` at `index`, replacing the current child or appending
    /// right after the last one.
    pub fn set_child(&self, index: usize, child: NodeRef) -> Result<()> {
        let Body::Internal(children) = &self.body else {
            return Err(Error::NotInternal);
        };
        let mut children = children.write().unwrap_or_else(PoisonError::into_inner);
        match index.cmp(&children.len()) {
            std::cmp::Ordering::Less => children[index] = child,
            std::cmp::Ordering::Equal => children.push(child),
            std::cmp::Ordering::Greater => {
                return Err(Error::ChildIndex {
                    index,
                    len: children.len(),
                })
            }
        }
        drop(children);
        self.invalidate();
        Ok(())
    }

    /// Drop children beyond the first `len`.
    pub fn truncate_children(&self, len: usize) {
        if let Body::Internal(children) = &self.body {
            let mut children = children.write().unwrap_or_else(PoisonError::into_inner);
            if children.len() > len {
                children.truncate(len);
                drop(children);
                self.invalidate();
            }
        }
    }

    /// A new node with the same content and the same child handles.
    pub fn shallow_copy(&self) -> NodeRef {
        let body = match &self.body {
            Body::Leaf => Body::Leaf,
            Body::Internal(_) => Body::Internal(RwLock::new(self.children())),
        };
        Arc::new(Self {
            class_id: self.class_id,
            data: self.data.clone(),
            body,
            hash: RwLock::new(self.cached_hash()),
        })
    }

    /// Structural equality, ignoring cached hashes.
    pub fn content_eq(&self, other: &MerkleNode) -> bool {
        if self.class_id != other.class_id
            || self.is_internal() != other.is_internal()
            || self.data != other.data
        {
            return false;
        }
        let ours = self.children();
        let theirs = other.children();
        ours.len() == theirs.len() && ours.iter().zip(&theirs).all(|(a, b)| a.content_eq(b))
    }

    /// Number of nodes in this subtree, including this one.
    pub fn subtree_size(&self) -> usize {
        1 + self.children().iter().map(|c| c.subtree_size()).sum::<usize>()
    }

    fn invalidate(&self) {
        *self.hash.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// BLAKE3 over class id, kind, payload and child hashes.
pub fn compute_hash(class_id: ClassId, internal: bool, data: &[u8], child_hashes: &[Hash]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&class_id.0.to_be_bytes());
    hasher.update(&[if internal { KIND_INTERNAL } else { KIND_LEAF }]);
    hasher.update(&(data.len() as u64).to_be_bytes());
    hasher.update(data);
    for hash in child_hashes {
        hasher.update(hash.as_bytes());
    }
    Hash(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEAF: ClassId = ClassId(1);
    const NODE: ClassId = ClassId(2);

    #[test]
    fn test_equal_content_equal_hash() {
        let a = MerkleNode::internal(NODE, "n", vec![MerkleNode::leaf(LEAF, "x")]);
        let b = MerkleNode::internal(NODE, "n", vec![MerkleNode::leaf(LEAF, "x")]);
        let c = MerkleNode::internal(NODE, "n", vec![MerkleNode::leaf(LEAF, "y")]);

        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
        assert!(a.content_eq(&b));
        assert!(!a.content_eq(&c));
    }

    #[test]
    fn test_kind_and_class_are_hashed() {
        let leaf = MerkleNode::leaf(LEAF, "x");
        let empty_internal = MerkleNode::internal(LEAF, "x", vec![]);
        let other_class = MerkleNode::leaf(NODE, "x");

        assert_ne!(leaf.hash(), empty_internal.hash());
        assert_ne!(leaf.hash(), other_class.hash());
    }

    #[test]
    fn test_set_child_invalidates_hash() {
        let parent = MerkleNode::internal(NODE, "p", vec![MerkleNode::leaf(LEAF, "a")]);
        let before = parent.hash();

        parent.set_child(0, MerkleNode::leaf(LEAF, "b")).unwrap();
        assert!(parent.cached_hash().is_none());
        assert_ne!(parent.hash(), before);

        parent.set_child(1, MerkleNode::leaf(LEAF, "c")).unwrap();
        assert_eq!(parent.child_count(), 2);
        assert!(matches!(
            parent.set_child(5, MerkleNode::leaf(LEAF, "d")),
            Err(Error::ChildIndex { index: 5, len: 2 })
        ));
    }

    #[test]
    fn test_set_child_on_leaf_fails() {
        let leaf = MerkleNode::leaf(LEAF, "a");
        assert!(matches!(
            leaf.set_child(0, MerkleNode::leaf(LEAF, "b")),
            Err(Error::NotInternal)
        ));
    }

    #[test]
    fn test_shallow_copy_is_independent() {
        let original = MerkleNode::container(NODE, vec![MerkleNode::leaf(LEAF, "a"), MerkleNode::leaf(LEAF, "b")]);
        let copy = original.shallow_copy();
        assert_eq!(copy.cached_hash(), original.cached_hash());

        copy.truncate_children(1);
        assert_eq!(original.child_count(), 2);
        assert_eq!(copy.child_count(), 1);
        assert_ne!(copy.hash(), original.hash());
    }

    #[test]
    fn test_unhashed_nodes_hash_lazily() {
        let node = MerkleNode::unhashed_internal(NODE, "p", vec![MerkleNode::unhashed_leaf(LEAF, "a")]);
        assert!(node.cached_hash().is_none());
        let hash = node.hash();
        assert_eq!(node.cached_hash(), Some(hash));
        assert!(node.child(0).unwrap().cached_hash().is_some());
        assert_eq!(node.subtree_size(), 2);
    }
}
