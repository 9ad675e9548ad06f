//! Job states, terminal outcomes and the events observers receive.

use std::fmt;
use std::sync::Arc;

use crate::transport::FetchError;

/// Lifecycle of a download job. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Preflight,
    /// Waiting out a staged host's interstitial.
    StagedWait,
    Transferring,
    Verifying,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Idle => "idle",
            JobState::Preflight => "preflight",
            JobState::StagedWait => "staged-wait",
            JobState::Transferring => "transferring",
            JobState::Verifying => "verifying",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a job ended. Only `Success` leaves a file at the destination.
#[derive(Debug, Clone)]
pub enum DownloadOutcome {
    Success,
    ChecksumMismatch,
    Cancelled,
    InsufficientSpace,
    TransferError(Arc<FetchError>),
}

impl DownloadOutcome {
    /// Short name, as stored in the download history.
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadOutcome::Success => "success",
            DownloadOutcome::ChecksumMismatch => "checksum-mismatch",
            DownloadOutcome::Cancelled => "cancelled",
            DownloadOutcome::InsufficientSpace => "insufficient-space",
            DownloadOutcome::TransferError(_) => "transfer-error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DownloadOutcome::Success)
    }

    pub fn terminal_state(&self) -> JobState {
        match self {
            DownloadOutcome::Success => JobState::Completed,
            DownloadOutcome::Cancelled => JobState::Cancelled,
            _ => JobState::Failed,
        }
    }
}

impl fmt::Display for DownloadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadOutcome::TransferError(cause) => write!(f, "transfer error: {}", cause),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Bytes written so far and the expected total, when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub bytes: u64,
    pub total: Option<u64>,
}

impl Progress {
    /// Whole percent, if the total is known and non-zero.
    pub fn percent(&self) -> Option<u8> {
        match self.total {
            Some(total) if total > 0 => Some(((self.bytes.min(total) * 100) / total) as u8),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DownloadEvent {
    Progress(Progress),
    /// Work is happening but no byte count applies (staged host cooldown).
    Indeterminate,
    Finished(DownloadOutcome),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_maps_to_terminal_state() {
        assert_eq!(DownloadOutcome::Success.terminal_state(), JobState::Completed);
        assert_eq!(DownloadOutcome::Cancelled.terminal_state(), JobState::Cancelled);
        assert_eq!(
            DownloadOutcome::ChecksumMismatch.terminal_state(),
            JobState::Failed
        );
        let err = DownloadOutcome::TransferError(Arc::new(FetchError::Http(404)));
        assert_eq!(err.terminal_state(), JobState::Failed);
        assert_eq!(err.to_string(), "transfer error: HTTP 404");
    }

    #[test]
    fn terminal_states() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        assert!(!JobState::Verifying.is_terminal());
        assert!(!JobState::Idle.is_terminal());
    }

    #[test]
    fn percent_of_known_total() {
        let p = Progress {
            bytes: 2048,
            total: Some(4096),
        };
        assert_eq!(p.percent(), Some(50));
        let p = Progress {
            bytes: 10,
            total: None,
        };
        assert_eq!(p.percent(), None);
        let p = Progress {
            bytes: 0,
            total: Some(0),
        };
        assert_eq!(p.percent(), None);
    }
}
