//! Allocation service configuration.

use std::time::Duration;

/// Configuration for the allocation service.
#[derive(Debug, Clone)]
pub struct BookingConfig {
    /// Budget of one allocation write, from issuing the request to the
    /// store reaching the write (default: 5000). The store rolls back a
    /// write that runs past it and reports a retryable timeout. Configure
    /// the repositories with the same value.
    pub lock_timeout_ms: u64,
    /// Extra time the service waits for the store's answer after the lock
    /// timeout before it stops waiting (default: 1000).
    pub response_grace_ms: u64,
    /// How many times a write that lost a commit race against another
    /// writer on the same show is re-validated before the conflict is
    /// reported to the caller (default: 3). Values below 1 count as 1.
    pub max_conflict_attempts: u32,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5000,
            response_grace_ms: 1000,
            max_conflict_attempts: 3,
        }
    }
}

impl BookingConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// How long the service waits for one attempt before giving up on it.
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms.saturating_add(self.response_grace_ms))
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.max_conflict_attempts.max(1)
    }
}
