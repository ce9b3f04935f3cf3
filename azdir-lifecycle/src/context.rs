//! Deadline-bearing operation context.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Carries the deadline of one lifecycle operation.
///
/// Every suspension point (lock acquisition, remote call, poll sleep) is
/// bounded by this deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationContext {
    deadline: Instant,
}

impl OperationContext {
    /// Context expiring `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
        }
    }

    /// The deadline.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline, zero once expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Runs `future` until it completes or the deadline passes.
    /// Returns `None` on expiry.
    pub async fn run<F: Future>(&self, future: F) -> Option<F::Output> {
        tokio::time::timeout_at(self.deadline, future).await.ok()
    }
}
