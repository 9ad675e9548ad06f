//! Verified package downloads.
//!
//! A [`DownloadManager`] holds the collaborators (transport, staged-host
//! strategies, free-space probe, keep-awake source) and creates one
//! [`DownloadJob`] per requested package. A job runs once, on its own thread:
//!
//! `Idle → Preflight → (StagedWait) → Transferring → Verifying → {Completed | Failed | Cancelled}`
//!
//! The destination either ends up holding a package whose MD5 matches the
//! descriptor, or does not exist.

mod events;
mod outcome;
mod run;
mod staged;

pub use events::EventReceiver;
pub use outcome::{DownloadEvent, DownloadOutcome, JobState, Progress};
pub use staged::{
    CooldownStrategy, FetchStrategy, HostPattern, StageContext, StrategyRegistry, UrlPredicate,
};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::awake::{InhibitKeepAwake, KeepAwake};
use crate::config::OtaConfig;
use crate::control::CancelToken;
use crate::descriptor::BuildDescriptor;
use crate::storage::{SpaceProbe, StatvfsProbe};
use crate::transport::{CurlTransport, Transport};
use events::EventHub;
use run::Runner;

pub const DEFAULT_CHUNK_SIZE: usize = 4096;
pub const DEFAULT_WAKE_GRACE: Duration = Duration::from_millis(30_000);

/// Lock that survives a panicked holder; job state stays readable.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("download job already started")]
    AlreadyStarted,
    #[error("could not spawn download thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Creates download jobs that share one set of collaborators.
#[derive(Clone)]
pub struct DownloadManager {
    transport: Arc<dyn Transport>,
    strategies: Arc<StrategyRegistry>,
    space: Arc<dyn SpaceProbe>,
    keep_awake: Arc<dyn KeepAwake>,
    chunk_size: usize,
    wake_grace: Duration,
}

impl DownloadManager {
    /// Manager with no staged hosts, statvfs space checks and a systemd inhibitor.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            strategies: Arc::new(StrategyRegistry::new()),
            space: Arc::new(StatvfsProbe),
            keep_awake: Arc::new(InhibitKeepAwake::default()),
            chunk_size: DEFAULT_CHUNK_SIZE,
            wake_grace: DEFAULT_WAKE_GRACE,
        }
    }

    pub fn from_config(cfg: &OtaConfig) -> Self {
        Self::new(CurlTransport::from_config(cfg))
            .with_strategies(StrategyRegistry::from_config(&cfg.staged_hosts))
            .with_chunk_size(cfg.chunk_size)
            .with_wake_grace(cfg.wake_grace())
    }

    pub fn with_strategies(mut self, strategies: StrategyRegistry) -> Self {
        self.strategies = Arc::new(strategies);
        self
    }

    pub fn with_space_probe(mut self, probe: impl SpaceProbe + 'static) -> Self {
        self.space = Arc::new(probe);
        self
    }

    pub fn with_keep_awake(mut self, keep_awake: impl KeepAwake + 'static) -> Self {
        self.keep_awake = Arc::new(keep_awake);
        self
    }

    /// Bytes read and written per step. Zero is treated as one.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// How long the keep-awake assertion outlives the job.
    pub fn with_wake_grace(mut self, grace: Duration) -> Self {
        self.wake_grace = grace;
        self
    }

    /// New idle job writing `descriptor`'s package to `destination`.
    pub fn create_job(&self, descriptor: BuildDescriptor, destination: PathBuf) -> DownloadJob {
        let strategy = self.strategies.select(&descriptor.url);
        if strategy.is_some() {
            tracing::debug!(url = %descriptor.url, "staged host strategy selected");
        }
        let runner = Runner {
            transport: Arc::clone(&self.transport),
            strategy,
            space: Arc::clone(&self.space),
            keep_awake: Arc::clone(&self.keep_awake),
            chunk_size: self.chunk_size,
            wake_grace: self.wake_grace,
        };
        DownloadJob {
            shared: Arc::new(JobShared::new(descriptor, destination)),
            runner: Mutex::new(Some(runner)),
            worker: Mutex::new(None),
        }
    }

    /// Job writing to `dir` under the descriptor's package file name.
    pub fn create_job_in(&self, descriptor: BuildDescriptor, dir: &Path) -> DownloadJob {
        let destination = dir.join(descriptor.package_file_name());
        self.create_job(descriptor, destination)
    }
}

/// State shared between a job handle and its worker thread.
pub(crate) struct JobShared {
    descriptor: BuildDescriptor,
    destination: PathBuf,
    cancel: CancelToken,
    state: Mutex<JobState>,
    bytes: AtomicU64,
    total: Mutex<Option<u64>>,
    outcome: Mutex<Option<DownloadOutcome>>,
    hub: EventHub,
}

impl JobShared {
    fn new(descriptor: BuildDescriptor, destination: PathBuf) -> Self {
        Self {
            descriptor,
            destination,
            cancel: CancelToken::new(),
            state: Mutex::new(JobState::Idle),
            bytes: AtomicU64::new(0),
            total: Mutex::new(None),
            outcome: Mutex::new(None),
            hub: EventHub::new(),
        }
    }

    pub(crate) fn set_state(&self, next: JobState) {
        let mut state = lock(&self.state);
        if state.is_terminal() {
            return;
        }
        tracing::debug!(from = state.as_str(), to = next.as_str(), "download state");
        *state = next;
    }

    pub(crate) fn set_total(&self, total: Option<u64>) {
        *lock(&self.total) = total;
    }

    pub(crate) fn set_bytes(&self, bytes: u64) {
        self.bytes.store(bytes, Ordering::Relaxed);
    }

    /// Record the outcome, enter the matching terminal state and notify the observer.
    pub(crate) fn finish(&self, outcome: DownloadOutcome) {
        *lock(&self.outcome) = Some(outcome.clone());
        self.set_state(outcome.terminal_state());
        self.hub.publish(DownloadEvent::Finished(outcome));
    }
}

/// One download attempt. Not reusable once it has reached a terminal state.
pub struct DownloadJob {
    shared: Arc<JobShared>,
    runner: Mutex<Option<Runner>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DownloadJob {
    /// Start the job on a background thread. Returns immediately.
    pub fn start(&self) -> Result<(), JobError> {
        let runner = lock(&self.runner).take().ok_or(JobError::AlreadyStarted)?;
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("ota-download".into())
            .spawn(move || {
                runner.run(&shared);
            })?;
        *lock(&self.worker) = Some(handle);
        Ok(())
    }

    /// Ask the job to stop. No bytes are written after the current chunk.
    pub fn cancel(&self) {
        tracing::info!(url = %self.shared.descriptor.url, "download cancel requested");
        self.shared.cancel.cancel();
    }

    /// Attach an observer, replacing any previous one. Buffered events are replayed.
    pub fn attach_observer(&self) -> EventReceiver {
        self.shared.hub.attach()
    }

    /// Detach the current observer. The job keeps running.
    pub fn detach_observer(&self) {
        self.shared.hub.detach();
    }

    pub fn state(&self) -> JobState {
        *lock(&self.shared.state)
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.shared.bytes.load(Ordering::Relaxed)
    }

    /// Expected size, once response headers have arrived with a length.
    pub fn total_bytes(&self) -> Option<u64> {
        *lock(&self.shared.total)
    }

    pub fn outcome(&self) -> Option<DownloadOutcome> {
        lock(&self.shared.outcome).clone()
    }

    pub fn descriptor(&self) -> &BuildDescriptor {
        &self.shared.descriptor
    }

    pub fn destination(&self) -> &Path {
        &self.shared.destination
    }

    /// Block until the worker exits and return the outcome (None if never started).
    pub fn wait(&self) -> Option<DownloadOutcome> {
        let worker = lock(&self.worker).take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                tracing::error!("download thread panicked");
            }
        }
        self.outcome()
    }
}
