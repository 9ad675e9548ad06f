//! `ota status` – installed build, identity and the recorded update.

use anyhow::Result;
use ota_core::check::{evaluate_stored, UpdaterState};
use ota_core::descriptor::format_build_date;

use super::print_report;

pub async fn run_status(state: &UpdaterState) -> Result<()> {
    let installed = &state.installed;
    println!(
        "Installed: {} {} built {} on {}",
        installed.build_id.as_deref().unwrap_or("-"),
        installed.version.as_deref().unwrap_or("-"),
        installed
            .published_at
            .map(format_build_date)
            .unwrap_or_else(|| "-".to_string()),
        if installed.device_id.is_empty() {
            "-"
        } else {
            installed.device_id.as_str()
        }
    );
    if state.identity_up_to_date {
        println!("Identity: unchanged since last run");
    } else {
        println!("Identity: changed since last run (run `ota mark-current`)");
    }
    let notif = state.store.show_notif().await?;
    println!("Notifications: {}", if notif { "on" } else { "off" });

    let report = evaluate_stored(state).await?;
    print_report(&report);
    Ok(())
}
