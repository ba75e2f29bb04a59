//! Polling budget for a task type.

use std::time::Duration;

/// How long and how often to poll the backend for a job's result.
///
/// Constant for a given task type; the total budget is
/// `interval * max_attempts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait before each status query.
    pub interval: Duration,
    /// Number of status queries before giving up.
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Worst-case wall time spent waiting between queries.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}
