//! The teacher's shadow send-tree.
//!
//! Every node that is queued for sending gets a [`NodeToSend`] entry. Entries
//! form a tree mirroring the nodes in flight, so a positive query response
//! can cancel the pending sends of a whole subtree at once.
//!
//! Both teacher workers touch this tree: the sender creates entries and waits
//! on them, the receiver registers responses. State is kept per entry in
//! atomics plus a mutex around each child list.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

/// Send bookkeeping for one node.
pub struct NodeToSend<T> {
    node: T,
    /// `None` for leaves.
    children: Option<Mutex<Vec<Arc<NodeToSend<T>>>>>,
    response_received: AtomicBool,
    /// Once true, never false again.
    response_status: AtomicBool,
    cancelled: AtomicBool,
    deadline: Instant,
    resolved: Notify,
}

impl<T> NodeToSend<T> {
    fn new(node: T, internal: bool, deadline: Instant, status: bool) -> Self {
        Self {
            node,
            children: internal.then(|| Mutex::new(Vec::new())),
            response_received: AtomicBool::new(false),
            response_status: AtomicBool::new(status),
            cancelled: AtomicBool::new(status),
            deadline,
            resolved: Notify::new(),
        }
    }

    /// Entry for the root of a subtree. It is never waited on.
    pub fn root(node: T, internal: bool) -> Arc<Self> {
        let entry = Self::new(node, internal, Instant::now(), false);
        entry.response_received.store(true, Ordering::SeqCst);
        Arc::new(entry)
    }

    /// Register a child entry under `self`.
    ///
    /// The child inherits a confirmed status from its parent. The copy and
    /// the insertion happen under the parent's child lock, so a concurrent
    /// cancellation either sees the new child or the child sees the status.
    pub fn add_child(self: &Arc<Self>, node: T, internal: bool, max_ack_delay: Duration) -> Arc<Self> {
        let deadline = Instant::now() + max_ack_delay;
        match &self.children {
            Some(children) => {
                let mut children = children.lock().unwrap_or_else(PoisonError::into_inner);
                let child = Arc::new(Self::new(node, internal, deadline, self.has_response_status()));
                children.push(child.clone());
                child
            }
            None => Arc::new(Self::new(node, internal, deadline, self.has_response_status())),
        }
    }

    pub fn node(&self) -> &T {
        &self.node
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Whether the learner answered this node's query.
    pub fn response_received(&self) -> bool {
        self.response_received.load(Ordering::SeqCst)
    }

    /// Whether the learner is known to have this node, directly or through
    /// an ancestor.
    pub fn has_response_status(&self) -> bool {
        self.response_status.load(Ordering::SeqCst)
    }

    fn is_resolved(&self) -> bool {
        self.response_received() || self.has_response_status()
    }

    /// Record the learner's answer for this node.
    ///
    /// A positive answer cancels every pending descendant. A negative answer
    /// never clears a status set by an ancestor.
    pub fn register_response(&self, learner_has_node: bool) {
        self.response_received.store(true, Ordering::SeqCst);
        if learner_has_node {
            self.response_status.store(true, Ordering::SeqCst);
            self.cancelled.store(true, Ordering::SeqCst);
            self.cancel_descendants();
        }
        self.resolved.notify_waiters();
    }

    /// Mark all reachable descendants as confirmed, breadth first.
    fn cancel_descendants(&self) {
        let mut queue: VecDeque<Arc<NodeToSend<T>>> = VecDeque::new();
        collect_children(self, &mut queue);

        while let Some(entry) = queue.pop_front() {
            if entry.cancelled.swap(true, Ordering::SeqCst) {
                continue;
            }
            entry.response_status.store(true, Ordering::SeqCst);
            entry.resolved.notify_waiters();
            collect_children(&entry, &mut queue);
        }
    }

    /// Wait until this node is resolved or its deadline passes.
    pub async fn wait_for_response(&self) {
        loop {
            let notified = self.resolved.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_resolved() {
                return;
            }
            if tokio::time::timeout_at(self.deadline, notified).await.is_err() {
                return;
            }
        }
    }
}

fn collect_children<T>(entry: &NodeToSend<T>, queue: &mut VecDeque<Arc<NodeToSend<T>>>) {
    if let Some(children) = &entry.children {
        let children = children.lock().unwrap_or_else(PoisonError::into_inner);
        queue.extend(children.iter().cloned());
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for NodeToSend<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeToSend")
            .field("node", &self.node)
            .field("response_received", &self.response_received())
            .field("response_status", &self.has_response_status())
            .finish_non_exhaustive()
    }
}

/// FIFO queues the teacher workers share for one subtree.
///
/// The handle queue feeds the sending worker. The response queue holds
/// entries whose query was sent, in query order, for the receiving worker.
pub struct SendSchedule<T> {
    max_ack_delay: Duration,
    to_handle: Mutex<VecDeque<Arc<NodeToSend<T>>>>,
    awaiting_response: Mutex<VecDeque<Arc<NodeToSend<T>>>>,
}

impl<T> SendSchedule<T> {
    pub fn new(max_ack_delay: Duration) -> Self {
        Self {
            max_ack_delay,
            to_handle: Mutex::new(VecDeque::new()),
            awaiting_response: Mutex::new(VecDeque::new()),
        }
    }

    pub fn max_ack_delay(&self) -> Duration {
        self.max_ack_delay
    }

    /// Queue the root of a subtree for sending.
    pub fn push_root(&self, node: T, internal: bool) {
        self.lock_handle().push_back(NodeToSend::root(node, internal));
    }

    /// Queue a child whose query is about to be sent.
    ///
    /// The entry goes to both queues: it will be sent after the parent's
    /// other queued work, and it expects one query response.
    pub fn push_child(&self, parent: &Arc<NodeToSend<T>>, node: T, internal: bool) -> Arc<NodeToSend<T>> {
        let child = parent.add_child(node, internal, self.max_ack_delay);
        self.lock_handle().push_back(child.clone());
        self.lock_response().push_back(child.clone());
        child
    }

    pub fn next_to_handle(&self) -> Option<Arc<NodeToSend<T>>> {
        self.lock_handle().pop_front()
    }

    pub fn has_nodes_to_handle(&self) -> bool {
        !self.lock_handle().is_empty()
    }

    pub fn next_awaiting_response(&self) -> Option<Arc<NodeToSend<T>>> {
        self.lock_response().pop_front()
    }

    pub fn is_response_expected(&self) -> bool {
        !self.lock_response().is_empty()
    }

    /// Drop all pending entries.
    pub fn clear(&self) {
        self.lock_handle().clear();
        self.lock_response().clear();
    }

    fn lock_handle(&self) -> std::sync::MutexGuard<'_, VecDeque<Arc<NodeToSend<T>>>> {
        self.to_handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_response(&self) -> std::sync::MutexGuard<'_, VecDeque<Arc<NodeToSend<T>>>> {
        self.awaiting_response.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
