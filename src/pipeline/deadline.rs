//! Request-scoped deadline
//!
//! Every stage timeout is clipped to what is left of the request budget, so
//! the sum of stage timeouts can never exceed it.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    /// A deadline that never clips anything
    pub fn unbounded() -> Self {
        Self::new(Duration::MAX)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// The smaller of `timeout` and the remaining budget
    pub fn clip(&self, timeout: Duration) -> Duration {
        timeout.min(self.remaining())
    }
}
