//! Learner side of a reconnect session.
//!
//! One worker per subtree reads lessons in the order it anticipated them,
//! attaches the resulting nodes, and answers each embedded query right away.
//! Custom view subtrees are queued and learned after their parent, over the
//! same connection. Once everything has arrived, the views rebuild their
//! marked nodes, nested subtrees first.

mod worker;

use std::sync::Arc;
use std::time::Instant;

use reconnect_stream::Connection;
use tokio::sync::oneshot;
use tracing::info;

use crate::config::ReconnectConfig;
use crate::error::{Error, Result};
use crate::handoff::{subtree_name, FinishedView, LearnerSubtree, SubtreeQueue};
use crate::rate_limit::RateLimitedWarning;
use crate::stats::{ReconnectNodeCount, SessionReport};
use crate::view::LearnerView;
use crate::work_group::{Interrupter, WorkGroup};

use worker::LearnerWorker;

/// Everything a learner subtree job needs from its session.
#[derive(Clone)]
pub struct LearnerContext {
    pub(crate) name: String,
    pub(crate) connection: Connection,
    pub(crate) config: ReconnectConfig,
    pub(crate) interrupter: Interrupter,
    pub(crate) subtrees: SubtreeQueue<LearnerSubtree>,
    pub(crate) warnings: Arc<RateLimitedWarning>,
}

/// A fully received subtree, not yet initialized.
pub(crate) struct Learned<V: LearnerView> {
    pub(crate) view: V,
    pub(crate) root: Option<V::Node>,
    pub(crate) counts: ReconnectNodeCount,
}

/// Learn one subtree through `view` and wait for its worker.
pub(crate) async fn learn_subtree<V: LearnerView>(ctx: LearnerContext, view: V) -> Result<Learned<V>> {
    let worker = LearnerWorker {
        name: ctx.name.clone(),
        view,
        lessons: ctx.connection.input(),
        responses: ctx.connection.output(),
        subtrees: ctx.subtrees.clone(),
        warnings: ctx.warnings.clone(),
        strict_hash_checks: ctx.config.strict_hash_checks,
    };

    let (done_tx, done_rx) = oneshot::channel();
    let mut group = WorkGroup::new(ctx.interrupter.clone());
    group.execute(format!("learner {}", ctx.name), async move {
        let learned = worker.run().await?;
        // The receiver only goes away if the session was abandoned.
        let _ = done_tx.send(learned);
        Ok(())
    });
    group.join_all().await?;

    let learned = done_rx
        .await
        .map_err(|_| Error::sync("learner worker finished without a result"))?;
    tracing::debug!(
        "learned {}: {} data lessons, {} redundant",
        ctx.name,
        learned.counts.total(),
        learned.counts.redundant()
    );
    Ok(learned)
}

/// Result of a successful learning session.
#[derive(Debug)]
pub struct LearnerOutcome<N> {
    /// Root of the reconstructed tree.
    pub root: N,
    pub report: SessionReport<ReconnectNodeCount>,
}

/// Drives the learner side of a session over one connection.
pub struct LearningSynchronizer {
    connection: Connection,
    config: ReconnectConfig,
    interrupter: Interrupter,
}

impl LearningSynchronizer {
    pub fn new(connection: Connection, config: ReconnectConfig) -> Self {
        Self {
            connection,
            config,
            interrupter: Interrupter::new(),
        }
    }

    /// Handle for stopping the session from elsewhere.
    pub fn interrupter(&self) -> Interrupter {
        self.interrupter.clone()
    }

    /// Receive the teacher's tree into `view`.
    pub async fn synchronize<V: LearnerView>(self, view: V) -> Result<LearnerOutcome<V::Node>> {
        let started = Instant::now();
        let subtrees = SubtreeQueue::new();
        let warnings = Arc::new(RateLimitedWarning::new(self.config.hash_warning_interval));
        info!("learning session started");

        let root_name = subtree_name(0);
        let learned = learn_subtree(self.context(root_name.clone(), &subtrees, &warnings), view).await?;

        let mut report = SessionReport::default();
        report.record(root_name, learned.counts);

        let mut finished: Vec<Box<dyn FinishedView>> = Vec::new();
        let mut index = 1;
        while let Some(subtree) = subtrees.pop() {
            self.interrupter.check()?;
            let name = subtree_name(index);
            index += 1;

            let done = subtree.run(self.context(name.clone(), &subtrees, &warnings)).await?;
            report.record(name, done.counts);
            finished.push(done.view);
        }

        // A nested subtree always finishes after its parent, so walking
        // backwards rebuilds children before the nodes that contain them.
        for view in finished.iter_mut().rev() {
            view.initialize()?;
        }
        let Learned { mut view, root, .. } = learned;
        LearnerView::initialize(&mut view)?;

        for nested in finished.iter_mut() {
            nested.close();
        }
        LearnerView::close(&mut view);

        let root = root.ok_or_else(|| Error::sync("no root lesson was received"))?;
        info!(
            subtrees = report.subtrees.len(),
            data_lessons = report.totals.total(),
            redundant = report.totals.redundant(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "learning session finished"
        );
        Ok(LearnerOutcome { root, report })
    }

    fn context(
        &self,
        name: String,
        subtrees: &SubtreeQueue<LearnerSubtree>,
        warnings: &Arc<RateLimitedWarning>,
    ) -> LearnerContext {
        LearnerContext {
            name,
            connection: self.connection.clone(),
            config: self.config.clone(),
            interrupter: self.interrupter.clone(),
            subtrees: subtrees.clone(),
            warnings: warnings.clone(),
        }
    }
}
