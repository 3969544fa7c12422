//! # Poll Backoff
//!
//! Fibonacci-growing wait between two status queries, capped at a small
//! maximum. Infrastructure operations are short-lived, so the interval
//! settles at the cap instead of growing without bound.
//!
//! ```rust
//! use ionoscloud_reconciler::reconciler::backoff::PollBackoff;
//! use std::time::Duration;
//!
//! let mut backoff = PollBackoff::new(Duration::from_secs(1), Duration::from_secs(5));
//! assert_eq!(backoff.next_delay(), Duration::from_secs(1));
//! assert_eq!(backoff.next_delay(), Duration::from_secs(1));
//! assert_eq!(backoff.next_delay(), Duration::from_secs(2));
//! assert_eq!(backoff.next_delay(), Duration::from_secs(3));
//! assert_eq!(backoff.next_delay(), Duration::from_secs(5));
//! assert_eq!(backoff.next_delay(), Duration::from_secs(5));
//! ```

use crate::config::PollSettings;
use std::time::Duration;

/// Capped Fibonacci backoff
///
/// With `min == max` the interval is fixed.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    min: Duration,
    prev: Duration,
    current: Duration,
    max: Duration,
}

impl PollBackoff {
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        let max = max.max(min);
        Self {
            min,
            prev: Duration::ZERO,
            current: min,
            max,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &PollSettings) -> Self {
        Self::new(settings.min_interval, settings.max_interval)
    }

    /// Get the next wait and advance the sequence
    pub fn next_delay(&mut self) -> Duration {
        let result = self.current;
        let next = self.prev.saturating_add(self.current);
        self.prev = self.current;
        self.current = next.min(self.max);
        result
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev = Duration::ZERO;
        self.current = self.min;
    }
}
