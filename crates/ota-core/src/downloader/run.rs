//! The job state machine, run on the job's worker thread.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use super::outcome::{DownloadEvent, DownloadOutcome, JobState, Progress};
use super::staged::{FetchStrategy, StageContext};
use super::JobShared;
use crate::awake::KeepAwake;
use crate::checksum::{digest_matches, md5_path, RunningDigest};
use crate::storage::{remove_if_exists, PartialFile, SpaceProbe};
use crate::transport::{FetchError, Response, Transport};

/// Why a run stopped short of success.
#[derive(Debug, thiserror::Error)]
enum Stop {
    #[error("cancelled")]
    Cancelled,
    #[error("need {needed} bytes, {available} available")]
    InsufficientSpace { needed: u64, available: u64 },
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl From<io::Error> for Stop {
    fn from(e: io::Error) -> Self {
        Stop::Fetch(FetchError::Io(e))
    }
}

pub(crate) struct Runner {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) strategy: Option<Arc<dyn FetchStrategy>>,
    pub(crate) space: Arc<dyn SpaceProbe>,
    pub(crate) keep_awake: Arc<dyn KeepAwake>,
    pub(crate) chunk_size: usize,
    pub(crate) wake_grace: Duration,
}

impl Runner {
    pub(crate) fn run(self, job: &JobShared) -> DownloadOutcome {
        let guard = self
            .keep_awake
            .acquire(&format!("downloading {}", job.descriptor.name));

        let outcome = match self.execute(job) {
            Ok(()) => DownloadOutcome::Success,
            Err(Stop::Cancelled) => DownloadOutcome::Cancelled,
            Err(Stop::Fetch(_)) if job.cancel.is_cancelled() => DownloadOutcome::Cancelled,
            Err(stop @ Stop::InsufficientSpace { .. }) => {
                tracing::warn!("{}", stop);
                DownloadOutcome::InsufficientSpace
            }
            Err(stop @ Stop::ChecksumMismatch { .. }) => {
                tracing::warn!("{}", stop);
                DownloadOutcome::ChecksumMismatch
            }
            Err(Stop::Fetch(e)) => DownloadOutcome::TransferError(Arc::new(e)),
        };

        if !outcome.is_success() {
            if let Err(e) = remove_if_exists(&job.destination) {
                tracing::warn!(path = %job.destination.display(), "could not delete partial download: {}", e);
            }
        }
        tracing::info!(
            url = %job.descriptor.url,
            path = %job.destination.display(),
            outcome = %outcome,
            "download finished"
        );
        job.finish(outcome.clone());
        guard.linger(self.wake_grace);
        outcome
    }

    fn execute(&self, job: &JobShared) -> Result<(), Stop> {
        job.set_state(JobState::Preflight);
        if self.existing_matches(job)? {
            return Ok(());
        }
        if let Some(parent) = job.destination.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        check_cancel(job)?;

        let mut response = self.transport.open(&job.descriptor.url, &job.cancel)?;
        self.ensure_space(job, response.as_ref())?;

        if let Some(strategy) = &self.strategy {
            job.set_state(JobState::StagedWait);
            let ctx = StageContext::new(
                &job.descriptor.url,
                self.transport.as_ref(),
                &job.cancel,
                Some(&job.hub),
            );
            response = strategy.final_response(response, &ctx)?;
            // The second response is the one written to disk.
            self.ensure_space(job, response.as_ref())?;
        }

        self.transfer(job, response)
    }

    /// Checksum short-circuit: an existing destination with the right MD5 is
    /// the finished download. Anything else at the destination is removed.
    fn existing_matches(&self, job: &JobShared) -> Result<bool, Stop> {
        let dest = &job.destination;
        if !dest.is_file() {
            return Ok(false);
        }
        match md5_path(dest) {
            Ok(actual) if digest_matches(&job.descriptor.checksum, &actual) => {
                tracing::info!(path = %dest.display(), "existing package verified, skipping download");
                return Ok(true);
            }
            Ok(actual) => {
                tracing::debug!(path = %dest.display(), %actual, "existing file has wrong checksum, replacing");
            }
            Err(e) => {
                tracing::warn!(path = %dest.display(), "could not verify existing file: {:#}", e);
            }
        }
        remove_if_exists(dest)?;
        Ok(false)
    }

    fn ensure_space(&self, job: &JobShared, response: &dyn Response) -> Result<(), Stop> {
        let total = response.content_length();
        job.set_total(total);
        let Some(needed) = total else {
            tracing::debug!("content length unknown, skipping space check");
            return Ok(());
        };
        let dir = match job.destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => std::path::Path::new("."),
        };
        let available = self.space.available_space(dir)?;
        if available <= needed {
            return Err(Stop::InsufficientSpace { needed, available });
        }
        Ok(())
    }

    fn transfer(&self, job: &JobShared, mut response: Box<dyn Response>) -> Result<(), Stop> {
        job.set_state(JobState::Transferring);
        let total = response.content_length();
        let mut file = PartialFile::create(&job.destination)?;
        let mut digest = RunningDigest::new();
        let mut buf = vec![0u8; self.chunk_size];

        loop {
            let n = response.read_chunk(&mut buf)?;
            if n == 0 {
                break;
            }
            check_cancel(job)?;
            let chunk = &buf[..n];
            file.write_chunk(chunk)?;
            digest.update(chunk);
            job.set_bytes(file.written());
            job.hub.publish(DownloadEvent::Progress(Progress {
                bytes: file.written(),
                total,
            }));
        }
        drop(response);

        if let Some(expected) = total {
            if file.written() < expected {
                return Err(FetchError::PartialTransfer {
                    expected,
                    received: file.written(),
                }
                .into());
            }
        }

        job.set_state(JobState::Verifying);
        let actual = digest.finalize_hex();
        if !digest_matches(&job.descriptor.checksum, &actual) {
            return Err(Stop::ChecksumMismatch {
                expected: job.descriptor.checksum.clone(),
                actual,
            });
        }
        file.commit()?;
        Ok(())
    }
}

fn check_cancel(job: &JobShared) -> Result<(), Stop> {
    if job.cancel.is_cancelled() {
        Err(Stop::Cancelled)
    } else {
        Ok(())
    }
}
