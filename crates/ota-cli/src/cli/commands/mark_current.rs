//! `ota mark-current` – record the current identity as last seen.

use anyhow::Result;
use ota_core::check::UpdaterState;

pub async fn run_mark_current(state: &mut UpdaterState) -> Result<()> {
    state.mark_current().await?;
    println!(
        "Recorded identity: version code {}, device {}, rom {}",
        state.identity.version_code,
        state.identity.device.as_deref().unwrap_or("-"),
        state.identity.rom_id.as_deref().unwrap_or("-")
    );
    Ok(())
}
