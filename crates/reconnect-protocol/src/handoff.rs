//! Subtree handoff for custom view roots.
//!
//! When either side meets a custom reconnect root it does not descend into
//! it. Instead it queues a nested job that runs the same algorithm over the
//! subtree with a view specific to the root's class. Jobs are type-erased so
//! views with different node types can share one queue.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;

use crate::error::Result;
use crate::learner::{self, LearnerContext};
use crate::stats::{ReconnectNodeCount, TeacherStats};
use crate::teacher::{self, TeacherContext};
use crate::view::{LearnerView, TeacherView};

/// FIFO of subtree jobs shared by every worker of a session.
pub struct SubtreeQueue<J> {
    inner: Arc<Mutex<VecDeque<J>>>,
}

impl<J> Clone for SubtreeQueue<J> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<J> Default for SubtreeQueue<J> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
        }
    }
}

impl<J> SubtreeQueue<J> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, job: J) {
        self.lock().push_back(job);
    }

    pub fn pop(&self) -> Option<J> {
        self.lock().pop_front()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<J>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Name of the `index`th subtree of a session, in queue order.
///
/// Both peers drain their queues in the same order, so names match across
/// the connection.
pub(crate) fn subtree_name(index: usize) -> String {
    if index == 0 {
        "root".to_string()
    } else {
        format!("subtree-{index}")
    }
}

type TeacherJob = Box<dyn FnOnce(TeacherContext) -> BoxFuture<'static, Result<TeacherStats>> + Send>;

/// A subtree root plus the teacher view that serves it.
pub struct TeacherSubtree {
    job: TeacherJob,
}

impl TeacherSubtree {
    pub fn new<V: TeacherView>(root: V::Node, view: V) -> Self {
        Self {
            job: Box::new(move |ctx| Box::pin(teacher::teach_subtree(ctx, root, view))),
        }
    }

    pub(crate) async fn run(self, ctx: TeacherContext) -> Result<TeacherStats> {
        (self.job)(ctx).await
    }
}

impl std::fmt::Debug for TeacherSubtree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeacherSubtree").finish_non_exhaustive()
    }
}

/// A learner view whose subtree has been fully received.
pub(crate) trait FinishedView: Send {
    fn initialize(&mut self) -> Result<()>;
    fn close(&mut self);
}

impl<V: LearnerView> FinishedView for V {
    fn initialize(&mut self) -> Result<()> {
        LearnerView::initialize(self)
    }

    fn close(&mut self) {
        LearnerView::close(self)
    }
}

pub(crate) struct LearnedSubtree {
    pub(crate) counts: ReconnectNodeCount,
    pub(crate) view: Box<dyn FinishedView>,
}

type LearnerJob = Box<dyn FnOnce(LearnerContext) -> BoxFuture<'static, Result<LearnedSubtree>> + Send>;

/// A learner view for a custom subtree, waiting for its turn.
pub struct LearnerSubtree {
    job: LearnerJob,
}

impl LearnerSubtree {
    /// The view's original root must be the node the parent session placed
    /// at the custom root's position.
    pub fn new<V: LearnerView>(view: V) -> Self {
        Self {
            job: Box::new(move |ctx| {
                Box::pin(async move {
                    let learned = learner::learn_subtree(ctx, view).await?;
                    Ok(LearnedSubtree {
                        counts: learned.counts,
                        view: Box::new(learned.view),
                    })
                })
            }),
        }
    }

    pub(crate) async fn run(self, ctx: LearnerContext) -> Result<LearnedSubtree> {
        (self.job)(ctx).await
    }
}

impl std::fmt::Debug for LearnerSubtree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LearnerSubtree").finish_non_exhaustive()
    }
}
