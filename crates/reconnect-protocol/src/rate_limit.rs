//! Rate-limited warnings.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Emits at most one warning per interval and counts the ones it swallowed.
#[derive(Debug)]
pub struct RateLimitedWarning {
    interval: Duration,
    state: Mutex<WarningState>,
}

#[derive(Debug, Default)]
struct WarningState {
    last_emitted: Option<Instant>,
    suppressed: u64,
}

impl RateLimitedWarning {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Mutex::new(WarningState::default()),
        }
    }

    /// Log `message` unless a warning was logged within the interval.
    /// Returns whether it was logged.
    pub fn warn(&self, message: impl std::fmt::Display) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        let due = state
            .last_emitted
            .map_or(true, |last| now.duration_since(last) >= self.interval);
        if !due {
            state.suppressed += 1;
            return false;
        }

        let suppressed = std::mem::take(&mut state.suppressed);
        state.last_emitted = Some(now);
        drop(state);

        if suppressed > 0 {
            tracing::warn!(suppressed, "{}", message);
        } else {
            tracing::warn!("{}", message);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suppressed(warning: &RateLimitedWarning) -> u64 {
        warning.state.lock().unwrap().suppressed
    }

    #[test]
    fn test_suppresses_within_interval() {
        let warning = RateLimitedWarning::new(Duration::from_secs(60));
        assert!(warning.warn("first"));
        assert!(!warning.warn("second"));
        assert!(!warning.warn("third"));
        assert_eq!(suppressed(&warning), 2);
    }

    #[test]
    fn test_zero_interval_always_emits() {
        let warning = RateLimitedWarning::new(Duration::ZERO);
        assert!(warning.warn("a"));
        assert!(warning.warn("b"));
        assert_eq!(suppressed(&warning), 0);
    }
}
