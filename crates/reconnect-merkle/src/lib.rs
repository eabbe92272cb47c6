//! In-memory hash-linked tree store for reconnect sessions.
//!
//! [`MerkleNode`] is a tree of class-tagged nodes whose BLAKE3 hashes cover
//! their whole subtree. [`MerkleTeacherView`] serves such a tree to a
//! [`TeachingSynchronizer`](reconnect_protocol::TeachingSynchronizer) and
//! [`MerkleLearnerView`] rebuilds one on the learner side, reusing every
//! subtree the learner already had.
//!
//! Internal nodes whose class is listed in a [`CustomRootRegistry`] are
//! synchronized as separate subtrees, each through its own pair of views.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use reconnect_merkle::{CustomRootRegistry, MerkleLearnerView, MerkleTeacherView, TreeGenerator};
//! use reconnect_protocol::{LearningSynchronizer, ReconnectConfig, TeachingSynchronizer};
//! use reconnect_stream::Connection;
//!
//! # async fn demo() -> reconnect_protocol::Result<()> {
//! let config = ReconnectConfig::default();
//! let (a, b) = Connection::duplex(1 << 16, config.stream_config());
//! let registry = Arc::new(CustomRootRegistry::new());
//!
//! let mut generator = TreeGenerator::new(1);
//! let old = generator.tree(100);
//! let new = generator.mutate(&old, 10);
//!
//! let teacher = TeachingSynchronizer::new(a, config.clone());
//! let learner = LearningSynchronizer::new(b, config.clone());
//! let (taught, learned) = tokio::join!(
//!     teacher.synchronize(new.clone(), MerkleTeacherView::new(registry.clone(), config.max_ack_delay)),
//!     learner.synchronize(MerkleLearnerView::new(Some(old), registry)),
//! );
//! taught?;
//! assert_eq!(learned?.root.hash(), new.hash());
//! # Ok(())
//! # }
//! ```

mod codec;
mod error;
mod generate;
mod learner_view;
mod node;
mod registry;
mod teacher_view;

pub use codec::{decode_record, encode_node, NodeRecord};
pub use error::{Error, Result};
pub use generate::{TreeGenerator, INTERNAL_CLASS, LEAF_CLASS};
pub use learner_view::MerkleLearnerView;
pub use node::{compute_hash, MerkleNode, NodeRef};
pub use registry::CustomRootRegistry;
pub use teacher_view::MerkleTeacherView;
