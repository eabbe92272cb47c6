//! Session statistics.

use std::ops::AddAssign;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Data lessons a learner received, split by node kind.
///
/// A redundant count is a node whose data arrived even though the learner
/// already had it, because the teacher's wait for the query response timed
/// out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectNodeCount {
    pub internal: u64,
    pub redundant_internal: u64,
    pub leaf: u64,
    pub redundant_leaf: u64,
}

impl ReconnectNodeCount {
    pub fn record_internal(&mut self, redundant: bool) {
        self.internal += 1;
        if redundant {
            self.redundant_internal += 1;
        }
    }

    pub fn record_leaf(&mut self, redundant: bool) {
        self.leaf += 1;
        if redundant {
            self.redundant_leaf += 1;
        }
    }

    /// All data lessons, internal and leaf.
    pub fn total(&self) -> u64 {
        self.internal + self.leaf
    }

    pub fn redundant(&self) -> u64 {
        self.redundant_internal + self.redundant_leaf
    }
}

impl AddAssign for ReconnectNodeCount {
    fn add_assign(&mut self, rhs: Self) {
        self.internal += rhs.internal;
        self.redundant_internal += rhs.redundant_internal;
        self.leaf += rhs.leaf;
        self.redundant_leaf += rhs.redundant_leaf;
    }
}

/// Snapshot of what a teacher sent for one subtree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherStats {
    pub leaf_lessons: u64,
    pub internal_lessons: u64,
    pub up_to_date_lessons: u64,
    pub custom_view_roots: u64,
    /// Data sent because no response arrived before the deadline.
    pub forced_sends: u64,
    pub positive_responses: u64,
    pub negative_responses: u64,
}

impl TeacherStats {
    /// Lessons that carried node data.
    pub fn data_lessons(&self) -> u64 {
        self.leaf_lessons + self.internal_lessons
    }

    pub fn lessons(&self) -> u64 {
        self.data_lessons() + self.up_to_date_lessons + self.custom_view_roots
    }
}

impl AddAssign for TeacherStats {
    fn add_assign(&mut self, rhs: Self) {
        self.leaf_lessons += rhs.leaf_lessons;
        self.internal_lessons += rhs.internal_lessons;
        self.up_to_date_lessons += rhs.up_to_date_lessons;
        self.custom_view_roots += rhs.custom_view_roots;
        self.forced_sends += rhs.forced_sends;
        self.positive_responses += rhs.positive_responses;
        self.negative_responses += rhs.negative_responses;
    }
}

/// Live counters updated by both teacher workers.
#[derive(Debug, Default)]
pub struct TeacherCounters {
    leaf_lessons: AtomicU64,
    internal_lessons: AtomicU64,
    up_to_date_lessons: AtomicU64,
    custom_view_roots: AtomicU64,
    forced_sends: AtomicU64,
    positive_responses: AtomicU64,
    negative_responses: AtomicU64,
}

impl TeacherCounters {
    pub fn record_leaf(&self) {
        self.leaf_lessons.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_internal(&self) {
        self.internal_lessons.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_up_to_date(&self) {
        self.up_to_date_lessons.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_custom_view_root(&self) {
        self.custom_view_roots.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forced_send(&self) {
        self.forced_sends.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response(&self, learner_has_node: bool) {
        if learner_has_node {
            self.positive_responses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.negative_responses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> TeacherStats {
        TeacherStats {
            leaf_lessons: self.leaf_lessons.load(Ordering::Relaxed),
            internal_lessons: self.internal_lessons.load(Ordering::Relaxed),
            up_to_date_lessons: self.up_to_date_lessons.load(Ordering::Relaxed),
            custom_view_roots: self.custom_view_roots.load(Ordering::Relaxed),
            forced_sends: self.forced_sends.load(Ordering::Relaxed),
            positive_responses: self.positive_responses.load(Ordering::Relaxed),
            negative_responses: self.negative_responses.load(Ordering::Relaxed),
        }
    }
}

/// Statistics for one subtree of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtreeSummary<S> {
    pub name: String,
    pub stats: S,
}

/// Per-subtree statistics plus their sum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport<S> {
    pub subtrees: Vec<SubtreeSummary<S>>,
    pub totals: S,
}

impl<S: Default> Default for SessionReport<S> {
    fn default() -> Self {
        Self {
            subtrees: Vec::new(),
            totals: S::default(),
        }
    }
}

impl<S: Copy + Default + AddAssign> SessionReport<S> {
    pub fn record(&mut self, name: impl Into<String>, stats: S) {
        self.totals += stats;
        self.subtrees.push(SubtreeSummary {
            name: name.into(),
            stats,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_count_totals() {
        let mut count = ReconnectNodeCount::default();
        count.record_internal(false);
        count.record_leaf(true);
        count.record_leaf(false);

        assert_eq!(count.total(), 3);
        assert_eq!(count.redundant(), 1);
        assert_eq!(count.redundant_leaf, 1);
    }

    #[test]
    fn test_report_aggregates_subtrees() {
        let mut report = SessionReport::default();
        report.record(
            "root",
            ReconnectNodeCount {
                internal: 2,
                leaf: 3,
                ..Default::default()
            },
        );
        report.record(
            "subtree-1",
            ReconnectNodeCount {
                internal: 1,
                redundant_leaf: 1,
                leaf: 1,
                ..Default::default()
            },
        );

        assert_eq!(report.subtrees.len(), 2);
        assert_eq!(report.subtrees[1].name, "subtree-1");
        assert_eq!(report.totals.internal, 3);
        assert_eq!(report.totals.leaf, 4);
        assert_eq!(report.totals.redundant_leaf, 1);
    }

    #[test]
    fn test_teacher_counters_snapshot() {
        let counters = TeacherCounters::default();
        counters.record_internal();
        counters.record_leaf();
        counters.record_up_to_date();
        counters.record_response(true);
        counters.record_response(false);
        counters.record_response(false);

        let stats = counters.snapshot();
        assert_eq!(stats.data_lessons(), 2);
        assert_eq!(stats.lessons(), 3);
        assert_eq!(stats.positive_responses, 1);
        assert_eq!(stats.negative_responses, 2);
    }
}
