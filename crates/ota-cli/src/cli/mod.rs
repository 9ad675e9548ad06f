//! CLI for the OTA updater.

mod commands;
mod lock;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ota_core::check::UpdaterState;
use ota_core::config::{self, OtaConfig};
use ota_core::installed::InstalledState;
use ota_core::packages;
use ota_core::store::UpdateStore;
use std::path::{Path, PathBuf};
use std::time::Duration;

use commands::{
    run_check, run_checksum, run_download, run_files, run_history, run_install, run_mark_current,
    run_notify, run_prune, run_remove, run_status,
};

/// Top-level CLI for the OTA updater.
#[derive(Debug, Parser)]
#[command(name = "ota")]
#[command(about = "OTA: check for ROM updates and download verified packages", long_about = None)]
pub struct Cli {
    /// Build property file describing the installed build (overrides config).
    #[arg(long, global = true, value_name = "PATH")]
    pub build_prop: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch a build descriptor and record it if it is an update.
    Check {
        /// Path or http(s) URL of the descriptor JSON.
        source: String,
    },

    /// Download the recorded update and verify its checksum.
    Download {
        /// Directory to store the package in (default: configured download dir).
        #[arg(long, value_name = "DIR")]
        dest: Option<PathBuf>,
        /// Retry transient failures up to N times (default from config).
        #[arg(long, value_name = "N")]
        retries: Option<u32>,
        /// Download over a metered connection; remembered until the next re-flash.
        #[arg(long)]
        allow_metered: bool,
    },

    /// Reboot into recovery to flash a downloaded package.
    Install {
        /// Package file (normally in the download dir).
        package: PathBuf,
        /// Print the commands without running them.
        #[arg(long)]
        dry_run: bool,
    },

    /// List downloaded packages.
    Files {
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },

    /// Delete a downloaded package by file name.
    Rm {
        name: String,
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },

    /// Delete downloaded packages older than an age (e.g. 1w, 2w, 1m, 3m, 6m).
    Prune {
        #[arg(long, value_name = "AGE", value_parser = packages::parse_age)]
        older_than: Duration,
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },

    /// Show the installed build, identity and recorded update.
    Status,

    /// Remember the current device identity as seen.
    MarkCurrent,

    /// Turn update notifications on or off.
    Notify {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// List past downloads and their outcomes.
    History,

    /// Compute MD5 of a file (e.g. a manually fetched package).
    Checksum {
        /// Path to the file.
        path: String,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let build_prop = cli.build_prop.clone().unwrap_or_else(|| cfg.build_prop.clone());

        match cli.command {
            CliCommand::Checksum { path } => run_checksum(Path::new(&path)).await?,
            CliCommand::Notify { state } => {
                let store = UpdateStore::open_default().await?;
                run_notify(&store, state == Toggle::On).await?;
            }
            CliCommand::History => {
                let store = UpdateStore::open_default().await?;
                run_history(&store).await?;
            }
            CliCommand::Check { source } => {
                let state = load_state(&build_prop).await?;
                run_check(&state, &cfg, &source).await?;
            }
            CliCommand::Download {
                dest,
                retries,
                allow_metered,
            } => {
                let state = load_state(&build_prop).await?;
                run_download(&state, &cfg, dest, retries, allow_metered).await?;
            }
            CliCommand::Install { package, dry_run } => {
                let state = load_state(&build_prop).await?;
                run_install(&state, &build_prop, &package, dry_run).await?;
            }
            CliCommand::Files { dir } => run_files(&download_dir(&cfg, dir)?).await?,
            CliCommand::Rm { name, dir } => run_remove(&download_dir(&cfg, dir)?, &name).await?,
            CliCommand::Prune { older_than, dir } => {
                run_prune(&download_dir(&cfg, dir)?, older_than).await?
            }
            CliCommand::Status => {
                let state = load_state(&build_prop).await?;
                run_status(&state).await?;
            }
            CliCommand::MarkCurrent => {
                let mut state = load_state(&build_prop).await?;
                run_mark_current(&mut state).await?;
            }
        }

        Ok(())
    }
}

async fn load_state(build_prop: &Path) -> Result<UpdaterState> {
    let installed = InstalledState::load(build_prop)
        .with_context(|| format!("load installed build from {}", build_prop.display()))?;
    let store = UpdateStore::open_default().await?;
    UpdaterState::load(store, installed).await
}

/// Download directory: `--dest` if given, else the configured one.
fn download_dir(cfg: &OtaConfig, dest: Option<PathBuf>) -> Result<PathBuf> {
    match dest {
        Some(dir) => Ok(dir),
        None => cfg.resolve_download_dir(),
    }
}

#[cfg(test)]
mod tests;
