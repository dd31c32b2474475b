//! Thread membership tracking
//!
//! Keeps the set of thread IDs that currently belong to the target process.
//! The set only changes through [`ThreadTransition`]s produced by the thread
//! classifier, applied by the event filter after the decision is made.

use std::collections::HashSet;
use tracesieve_shared::Tid;
use tracing::trace;

/// A membership change for one thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadTransition {
    /// Thread started (or was already running at capture start)
    Track(Tid),

    /// Thread exited
    Untrack(Tid),
}

/// Set of live threads of the target process
#[derive(Debug, Default)]
pub struct ThreadTracker {
    threads: HashSet<Tid>,
}

impl ThreadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a transition. Returns true if membership changed.
    pub fn apply(&mut self, transition: ThreadTransition) -> bool {
        let changed = match transition {
            ThreadTransition::Track(tid) => self.threads.insert(tid),
            ThreadTransition::Untrack(tid) => self.threads.remove(&tid),
        };
        trace!(?transition, changed, live = self.threads.len(), "thread membership");
        changed
    }

    pub fn contains(&self, tid: Tid) -> bool {
        self.threads.contains(&tid)
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Tracked thread IDs in ascending order
    pub fn snapshot(&self) -> Vec<Tid> {
        let mut tids: Vec<Tid> = self.threads.iter().copied().collect();
        tids.sort_unstable();
        tids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let tracker = ThreadTracker::new();
        assert!(tracker.is_empty());
        assert!(!tracker.contains(1));
    }

    #[test]
    fn test_track_and_untrack() {
        let mut tracker = ThreadTracker::new();
        assert!(tracker.apply(ThreadTransition::Track(10)));
        assert!(tracker.apply(ThreadTransition::Track(11)));
        assert!(!tracker.apply(ThreadTransition::Track(10)));
        assert_eq!(tracker.snapshot(), vec![10, 11]);

        assert!(tracker.apply(ThreadTransition::Untrack(10)));
        assert!(!tracker.contains(10));
        assert!(tracker.contains(11));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_untrack_unknown_thread_is_noop() {
        let mut tracker = ThreadTracker::new();
        assert!(!tracker.apply(ThreadTransition::Untrack(99)));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_thread_id_reuse() {
        let mut tracker = ThreadTracker::new();
        tracker.apply(ThreadTransition::Track(5));
        tracker.apply(ThreadTransition::Untrack(5));
        tracker.apply(ThreadTransition::Track(5));
        assert!(tracker.contains(5));
    }
}
