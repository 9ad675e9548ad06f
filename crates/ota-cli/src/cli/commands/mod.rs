//! CLI command handlers. Each command is in its own file.

mod check;
mod checksum;
mod download;
mod files;
mod history;
mod install;
mod mark_current;
mod notify;
mod status;

pub use check::run_check;
pub use checksum::run_checksum;
pub use download::run_download;
pub use files::{run_files, run_prune, run_remove};
pub use history::run_history;
pub use install::run_install;
pub use mark_current::run_mark_current;
pub use notify::run_notify;
pub use status::run_status;

use ota_core::check::CheckReport;
use ota_core::descriptor::BuildDescriptor;

/// Plain-text stand-in for the update notification.
pub(crate) fn print_report(report: &CheckReport) {
    match report {
        CheckReport::Notify(d) => {
            println!("Update available: {}", describe(d));
            println!("  url: {}", d.url);
            if !d.changelog.trim().is_empty() {
                println!("  changelog:");
                for line in d.changelog.lines() {
                    println!("    {}", line);
                }
            }
            println!("Run `ota download` to fetch it.");
        }
        CheckReport::Suppressed(d) => {
            println!("Update available: {} (notifications off)", describe(d));
        }
        CheckReport::NoUpdate => println!("No update available."),
        CheckReport::Unsupported => {
            println!("This build is not supported (no otaupdater.otaid in build properties).")
        }
    }
}

fn describe(d: &BuildDescriptor) -> String {
    let mut s = d.name.clone();
    if let Some(v) = &d.version {
        s.push(' ');
        s.push_str(v);
    }
    if let Some(date) = d.published_at_string() {
        s.push_str(&format!(" ({})", date));
    }
    s
}
