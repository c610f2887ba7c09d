// src/failure.rs
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::ingest::Source;

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Per-source escalation state: armed until the threshold is reached,
/// fired until the next successful poll re-arms it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureState {
    pub consecutive_failures: u32,
    pub alert_fired: bool,
}

/// Outcome of a failed poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureRecord {
    pub count: u32,
    /// True only on the poll that moves the count from `threshold - 1` to `threshold`.
    pub just_crossed_threshold: bool,
}

/// Consecutive-failure counter per source with a one-shot alert flag.
#[derive(Debug)]
pub struct FailureTracker {
    threshold: u32,
    inner: Mutex<HashMap<Source, FailureState>>,
}

impl FailureTracker {
    /// `threshold` < 1 is treated as 1.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn record_failure(&self, source: &Source) -> FailureRecord {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let st = map.entry(source.clone()).or_default();
        st.consecutive_failures = st.consecutive_failures.saturating_add(1);

        let just_crossed = !st.alert_fired && st.consecutive_failures >= self.threshold;
        if just_crossed {
            st.alert_fired = true;
        }
        FailureRecord {
            count: st.consecutive_failures,
            just_crossed_threshold: just_crossed,
        }
    }

    /// Reset after a successful poll. Returns true if the source was past the
    /// threshold (alert fired) and is now recovering.
    pub fn record_success(&self, source: &Source) -> bool {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let st = map.entry(source.clone()).or_default();
        let was_recovering = st.alert_fired;
        *st = FailureState::default();
        was_recovering
    }

    pub fn state(&self, source: &Source) -> FailureState {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source)
            .copied()
            .unwrap_or_default()
    }
}

impl Default for FailureTracker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_excursion() {
        let ft = FailureTracker::new(3);
        let s = Source::from("a");
        let crossed: Vec<bool> = (0..6)
            .map(|_| ft.record_failure(&s).just_crossed_threshold)
            .collect();
        assert_eq!(crossed, vec![false, false, true, false, false, false]);
        assert_eq!(ft.state(&s).consecutive_failures, 6);
        assert!(ft.state(&s).alert_fired);
    }

    #[test]
    fn success_below_threshold_resets_silently() {
        let ft = FailureTracker::new(3);
        let s = Source::from("a");
        ft.record_failure(&s);
        ft.record_failure(&s);
        assert!(!ft.record_success(&s));
        assert_eq!(ft.state(&s), FailureState::default());
        // the count restarted, so two more failures do not cross
        ft.record_failure(&s);
        assert!(!ft.record_failure(&s).just_crossed_threshold);
    }

    #[test]
    fn sources_are_independent() {
        let ft = FailureTracker::new(1);
        assert!(ft.record_failure(&Source::from("a")).just_crossed_threshold);
        assert!(ft.record_failure(&Source::from("b")).just_crossed_threshold);
        assert_eq!(ft.state(&Source::from("c")), FailureState::default());
    }
}
