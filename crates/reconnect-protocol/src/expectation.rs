//! The learner's queue of positions waiting for a lesson.

use std::collections::VecDeque;

/// A tree position the learner expects the next lesson for.
#[derive(Debug, Clone)]
pub struct ExpectedLesson<T> {
    /// Node the lesson's result is attached to; `None` for a subtree root.
    pub parent: Option<T>,
    /// Child index within `parent`.
    pub position: usize,
    /// The learner's node that used to sit at this position, if any.
    pub original: Option<T>,
    /// Whether the learner answered this position's query with "present".
    pub already_present: bool,
}

/// FIFO of expected lessons.
///
/// Lessons arrive in the same order the learner anticipated them, so the
/// front of this queue always describes the next lesson on the stream.
#[derive(Debug)]
pub struct ExpectationQueue<T> {
    queue: VecDeque<ExpectedLesson<T>>,
}

impl<T> Default for ExpectationQueue<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }
}

impl<T> ExpectationQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect(&mut self, parent: Option<T>, position: usize, original: Option<T>, already_present: bool) {
        self.queue.push_back(ExpectedLesson {
            parent,
            position,
            original,
            already_present,
        });
    }

    pub fn next(&mut self) -> Option<ExpectedLesson<T>> {
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut queue = ExpectationQueue::new();
        queue.expect(None, 0, Some("old-root"), false);
        queue.expect(Some("root"), 0, None, false);
        queue.expect(Some("root"), 1, Some("old-b"), true);

        let root = queue.next().unwrap();
        assert!(root.parent.is_none());
        assert_eq!(root.original, Some("old-root"));

        assert_eq!(queue.next().unwrap().position, 0);
        let b = queue.next().unwrap();
        assert_eq!(b.position, 1);
        assert!(b.already_present);
        assert!(queue.is_empty());
    }
}
