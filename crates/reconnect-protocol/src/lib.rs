//! Reconnect Protocol - teacher/learner state reconciliation
//!
//! This crate brings a stale copy of a hash-linked tree up to date with a
//! peer's copy while transferring as little as possible:
//!
//! - **Lessons and queries**: the teacher sends one lesson per node,
//!   breadth first. An internal node's lesson carries the hashes of its
//!   children; the learner answers each with "present" or "absent".
//! - **Pipelining**: the teacher does not stop for answers. It waits at most
//!   `max_ack_delay` per node, then sends the data anyway.
//! - **Cancellation**: a "present" answer confirms the whole subtree, and
//!   every pending send below it becomes a one-byte `UpToDate` lesson.
//! - **Custom views**: a node can declare that its subtree is synchronized
//!   through a different [`TeacherView`]/[`LearnerView`] pair. Such subtrees
//!   are queued and handled after their parent over the same connection.
//!
//! Correlation is purely positional: neither lessons nor responses carry
//! identifiers, so both peers must anticipate and emit in lockstep.
//!
//! # Example
//!
//! ```rust,ignore
//! use reconnect_protocol::{LearningSynchronizer, ReconnectConfig, TeachingSynchronizer};
//! use reconnect_stream::Connection;
//!
//! let config = ReconnectConfig::from_env();
//! let (teacher_conn, learner_conn) = Connection::duplex(1 << 20, config.stream_config());
//!
//! let teacher = TeachingSynchronizer::new(teacher_conn, config.clone());
//! let learner = LearningSynchronizer::new(learner_conn, config);
//!
//! let (taught, learned) = tokio::join!(
//!     teacher.synchronize(teacher_root, teacher_view),
//!     learner.synchronize(learner_view),
//! );
//! let new_root = learned?.root;
//! ```

pub mod config;
pub mod error;
pub mod expectation;
pub mod handoff;
pub mod hash;
pub mod learner;
pub mod lesson;
pub mod rate_limit;
pub mod shadow;
pub mod stats;
pub mod teacher;
pub mod view;
pub mod work_group;

pub use config::ReconnectConfig;
pub use error::{Error, Result};
pub use expectation::{ExpectationQueue, ExpectedLesson};
pub use handoff::{LearnerSubtree, SubtreeQueue, TeacherSubtree};
pub use hash::{ClassId, Hash, HASH_LEN};
pub use learner::{LearnerOutcome, LearningSynchronizer};
pub use lesson::{Lesson, QueryResponse};
pub use rate_limit::RateLimitedWarning;
pub use shadow::{NodeToSend, SendSchedule};
pub use stats::{ReconnectNodeCount, SessionReport, SubtreeSummary, TeacherStats};
pub use teacher::TeachingSynchronizer;
pub use view::{LearnerView, SendEntry, TeacherView};
pub use work_group::{Interrupter, WorkGroup};
