//! `ota files`, `ota rm`, `ota prune` – manage downloaded packages.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use ota_core::packages;
use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::cli::lock::JobLock;

pub async fn run_files(dir: &Path) -> Result<()> {
    let files = packages::list(dir).with_context(|| format!("list {}", dir.display()))?;
    if files.is_empty() {
        println!("No packages in {}.", dir.display());
        return Ok(());
    }
    println!("{:<17} {:>10} {}", "MODIFIED", "MiB", "NAME");
    for f in files {
        let modified = DateTime::<Utc>::from(f.modified).format("%Y-%m-%d %H:%M");
        println!(
            "{:<17} {:>10.1} {}",
            modified.to_string(),
            f.size as f64 / 1_048_576.0,
            f.name
        );
    }
    Ok(())
}

pub async fn run_remove(dir: &Path, name: &str) -> Result<()> {
    // Not while a download may be writing into the same directory.
    let _lock = JobLock::acquire_default()?;
    let path = packages::remove(dir, name).with_context(|| format!("remove {}", name))?;
    println!("Removed {}", path.display());
    Ok(())
}

pub async fn run_prune(dir: &Path, older_than: Duration) -> Result<()> {
    let _lock = JobLock::acquire_default()?;
    let report = packages::prune(dir, older_than, SystemTime::now())
        .with_context(|| format!("prune {}", dir.display()))?;
    for path in &report.removed {
        println!("Removed {}", path.display());
    }
    if report.removed.is_empty() {
        println!("Nothing to prune.");
    }
    if !report.failed.is_empty() {
        for (path, e) in &report.failed {
            eprintln!("Could not remove {}: {}", path.display(), e);
        }
        bail!("{} package(s) could not be removed", report.failed.len());
    }
    Ok(())
}
