//! Backoff for callers that retry failed downloads.
//!
//! The download manager reports one outcome per job and never retries on its
//! own. `ota download` hands each failed outcome to [`RetryPolicy::after`],
//! which says whether a fresh job is worth starting and how long to wait first.

mod classify;

pub use classify::{cause_of, Cause};

use std::time::Duration;

use crate::downloader::DownloadOutcome;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    GiveUp,
    /// Start another job once this delay has passed.
    Wait(Duration),
}

/// Doubling backoff with an attempt budget. Built from the optional `[retry]`
/// section of the config file.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Jobs started in total, the first one included.
    pub max_attempts: u32,
    /// Wait before the second attempt.
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Same backoff, different attempt budget (at least one attempt).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Decision after attempt number `attempt` (1-based) ended with `outcome`.
    ///
    /// Only transfer errors are retried. A cancelled job, a full disk or a
    /// package that fails verification will not change by trying again.
    pub fn after(&self, attempt: u32, outcome: &DownloadOutcome) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        let DownloadOutcome::TransferError(err) = outcome else {
            return RetryDecision::GiveUp;
        };
        match cause_of(err) {
            Cause::Permanent => RetryDecision::GiveUp,
            Cause::Transient => RetryDecision::Wait(self.backoff(attempt)),
            // A mirror asking us to slow down gets one extra doubling.
            Cause::Throttled => RetryDecision::Wait(self.backoff(attempt + 1)),
        }
    }

    /// `base_delay` doubled `step - 1` times, never above `max_delay`.
    fn backoff(&self, step: u32) -> Duration {
        let doublings = step.saturating_sub(1).min(16);
        self.base_delay
            .checked_mul(1 << doublings)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}
