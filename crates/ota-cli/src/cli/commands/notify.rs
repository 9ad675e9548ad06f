//! `ota notify <on|off>`

use anyhow::Result;
use ota_core::store::UpdateStore;

pub async fn run_notify(store: &UpdateStore, on: bool) -> Result<()> {
    store.set_show_notif(on).await?;
    println!("Update notifications {}.", if on { "on" } else { "off" });
    Ok(())
}
