//! `ota install` – reboot into recovery with a downloaded package.

use anyhow::{Context, Result};
use ota_core::check::UpdaterState;
use ota_core::install::{verify_package, InstallPlan};
use ota_core::installed::DeviceLayout;
use std::ffi::OsStr;
use std::path::Path;

pub async fn run_install(
    state: &UpdaterState,
    build_prop: &Path,
    package: &Path,
    dry_run: bool,
) -> Result<()> {
    let package = std::fs::canonicalize(package)
        .with_context(|| format!("package {}", package.display()))?;
    let layout = DeviceLayout::load(build_prop)?;
    let plan = InstallPlan::new(&layout, &package)?;

    match state.store.stored_update().await? {
        Some(update)
            if package.file_name() == Some(OsStr::new(&update.package_file_name())) =>
        {
            println!("Verifying {} against the recorded update...", package.display());
            let path = package.clone();
            tokio::task::spawn_blocking(move || verify_package(&path, &update.checksum)).await??;
        }
        _ => println!(
            "{} is not the recorded update; its checksum was not verified.",
            package.display()
        ),
    }

    println!("Recovery will flash: {}", plan.recovery_path.display());
    for argv in &plan.commands {
        println!("  $ {}", argv.join(" "));
    }
    if dry_run {
        println!("Dry run; nothing executed.");
        return Ok(());
    }
    tokio::task::spawn_blocking(move || plan.run()).await??;
    Ok(())
}
