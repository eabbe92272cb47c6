//! Seeded random trees and edits, for simulations and tests.

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reconnect_protocol::ClassId;

use crate::node::{MerkleNode, NodeRef};

/// Class of generated leaves.
pub const LEAF_CLASS: ClassId = ClassId(1);
/// Class of generated internal nodes that carry a payload.
pub const INTERNAL_CLASS: ClassId = ClassId(2);

const MAX_CHILDREN: usize = 6;
const MAX_PAYLOAD: usize = 48;

/// Deterministic generator of trees and edits.
pub struct TreeGenerator {
    rng: StdRng,
    custom_class: Option<ClassId>,
    custom_probability: f64,
}

impl TreeGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            custom_class: None,
            custom_probability: 0.0,
        }
    }

    /// Make a share of non-root internal nodes custom containers of `class`.
    ///
    /// The probability is clamped to `0..=1`; NaN counts as zero.
    #[must_use]
    pub fn with_custom_class(mut self, class: ClassId, probability: f64) -> Self {
        self.custom_class = Some(class);
        self.custom_probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        self
    }

    /// A tree of about `nodes` nodes. The root is always internal.
    pub fn tree(&mut self, nodes: usize) -> NodeRef {
        let children = self.children(nodes.saturating_sub(1));
        MerkleNode::internal(INTERNAL_CLASS, self.payload(), children)
    }

    /// Apply `count` random edits to `root`.
    ///
    /// Edits copy the path from the root to the edited node, so the input
    /// tree is left untouched and unchanged subtrees are shared.
    pub fn mutate(&mut self, root: &NodeRef, count: usize) -> NodeRef {
        let mut current = root.clone();
        for _ in 0..count {
            current = self.edit(&current);
        }
        current
    }

    fn subtree(&mut self, budget: usize) -> NodeRef {
        if budget <= 1 {
            return self.leaf();
        }
        let children = self.children(budget - 1);
        match self.custom_class {
            Some(class) if self.rng.gen_bool(self.custom_probability) => MerkleNode::container(class, children),
            _ => MerkleNode::internal(INTERNAL_CLASS, self.payload(), children),
        }
    }

    /// Children sharing `budget` nodes between them.
    fn children(&mut self, budget: usize) -> Vec<NodeRef> {
        if budget == 0 {
            return Vec::new();
        }
        let count = self.rng.gen_range(1..=MAX_CHILDREN.min(budget));
        let mut remaining = budget;
        let mut children = Vec::with_capacity(count);
        for i in 0..count {
            let left = count - i - 1;
            let share = if left == 0 {
                remaining
            } else {
                self.rng.gen_range(1..=remaining - left)
            };
            remaining -= share;
            children.push(self.subtree(share));
        }
        children
    }

    fn edit(&mut self, node: &NodeRef) -> NodeRef {
        let mut children = node.children();
        if !children.is_empty() && self.rng.gen_bool(0.75) {
            let index = self.rng.gen_range(0..children.len());
            children[index] = self.edit(&children[index]);
            return MerkleNode::internal(node.class_id(), node.data().clone(), children);
        }

        if !node.is_internal() {
            return MerkleNode::leaf(node.class_id(), self.payload());
        }
        let is_container = Some(node.class_id()) == self.custom_class;
        match self.rng.gen_range(0..3) {
            0 if !children.is_empty() => {
                let index = self.rng.gen_range(0..children.len());
                children.remove(index);
                MerkleNode::internal(node.class_id(), node.data().clone(), children)
            }
            1 if !is_container => MerkleNode::internal(node.class_id(), self.payload(), children),
            _ => {
                let size = self.rng.gen_range(1..=4);
                children.push(self.subtree(size));
                MerkleNode::internal(node.class_id(), node.data().clone(), children)
            }
        }
    }

    fn leaf(&mut self) -> NodeRef {
        let payload = self.payload();
        MerkleNode::leaf(LEAF_CLASS, payload)
    }

    fn payload(&mut self) -> Bytes {
        let mut buf = vec![0u8; self.rng.gen_range(1..=MAX_PAYLOAD)];
        self.rng.fill(&mut buf[..]);
        Bytes::from(buf)
    }
}
