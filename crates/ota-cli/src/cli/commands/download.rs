//! `ota download` – fetch the recorded update with a verified download job.
//!
//! Holds the download lock for the whole run, renders progress from the
//! job's event stream, cancels the job on Ctrl-C and retries transient
//! transfer errors with backoff. On a metered connection it stops first
//! unless the data warning was already accepted.

use anyhow::{anyhow, bail, Result};
use ota_core::check::UpdaterState;
use ota_core::config::OtaConfig;
use ota_core::downloader::{DownloadEvent, DownloadJob, DownloadManager, DownloadOutcome, Progress};
use ota_core::network::{needs_data_warning, MeteredProbe, NetworkManagerProbe};
use ota_core::retry::RetryDecision;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cli::download_dir;
use crate::cli::lock::JobLock;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

pub async fn run_download(
    state: &UpdaterState,
    cfg: &OtaConfig,
    dest: Option<PathBuf>,
    retries: Option<u32>,
    allow_metered: bool,
) -> Result<()> {
    let Some(descriptor) = state.store.stored_update().await? else {
        bail!("no update recorded; run `ota check <SOURCE>` first");
    };
    if allow_metered {
        state.store.set_ignored_data_warn(true).await?;
    } else {
        let metering =
            tokio::task::spawn_blocking(|| NetworkManagerProbe::default().metering()).await?;
        if needs_data_warning(metering, state.store.ignored_data_warn().await?) {
            bail!(
                "the active connection is metered; rerun with --allow-metered to download \
                 anyway (remembered until the next re-flash)"
            );
        }
    }
    let _lock = JobLock::acquire_default()?;
    let dir = download_dir(cfg, dest)?;
    let manager = DownloadManager::from_config(cfg);
    let mut policy = cfg.retry_policy();
    if let Some(n) = retries {
        policy = policy.with_max_attempts(n.saturating_add(1));
    }

    let mut attempt = 1;
    loop {
        let job = Arc::new(manager.create_job_in(descriptor.clone(), &dir));
        println!("Downloading {} -> {}", descriptor.url, job.destination().display());
        let outcome = drive(Arc::clone(&job)).await?;
        state
            .store
            .record_download(&descriptor, job.destination(), &outcome)
            .await?;

        if outcome.is_success() {
            println!("Verified package: {}", job.destination().display());
            return Ok(());
        }
        match policy.after(attempt, &outcome) {
            RetryDecision::Wait(delay) => {
                eprintln!(
                    "Attempt {} failed ({}); retrying in {:.1}s",
                    attempt,
                    outcome,
                    delay.as_secs_f64()
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = tokio::signal::ctrl_c() => bail!("download failed: cancelled"),
                }
                attempt += 1;
            }
            RetryDecision::GiveUp => bail!("download failed: {}", outcome),
        }
    }
}

/// Run one job to its terminal outcome.
async fn drive(job: Arc<DownloadJob>) -> Result<DownloadOutcome> {
    let mut rx = job.attach_observer();
    job.start()?;

    let canceller = {
        let job = Arc::clone(&job);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!();
                eprintln!("Cancelling...");
                job.cancel();
            }
        })
    };

    let mut printer = ProgressPrinter::new();
    let mut outcome = None;
    while let Some(event) = rx.recv().await {
        match event {
            DownloadEvent::Progress(p) => printer.progress(p),
            DownloadEvent::Indeterminate => printer.waiting(),
            DownloadEvent::Finished(o) => outcome = Some(o),
        }
    }
    canceller.abort();

    let waited = tokio::task::spawn_blocking(move || job.wait()).await?;
    outcome
        .or(waited)
        .ok_or_else(|| anyhow!("download ended without an outcome"))
}

struct ProgressPrinter {
    started: Instant,
    last_print: Option<Instant>,
}

impl ProgressPrinter {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            last_print: None,
        }
    }

    fn waiting(&mut self) {
        println!("  waiting for mirror...");
    }

    fn progress(&mut self, p: Progress) {
        let now = Instant::now();
        let done = p.total.is_some_and(|t| p.bytes >= t);
        let due = self
            .last_print
            .map_or(true, |last| now.duration_since(last) >= PROGRESS_INTERVAL);
        if !(due || done) {
            return;
        }
        self.last_print = Some(now);

        let done_mib = p.bytes as f64 / 1_048_576.0;
        let elapsed = now.duration_since(self.started).as_secs_f64();
        let rate_mib = if elapsed > 0.0 { done_mib / elapsed } else { 0.0 };
        match (p.total, p.percent()) {
            (Some(total), Some(pct)) => println!(
                "  {:.1} / {:.1} MiB ({}%)  {:.2} MiB/s",
                done_mib,
                total as f64 / 1_048_576.0,
                pct,
                rate_mib
            ),
            _ => println!("  {:.1} MiB  {:.2} MiB/s", done_mib, rate_mib),
        }
    }
}
