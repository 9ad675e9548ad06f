//! `ota history` – list past downloads.

use anyhow::Result;
use chrono::DateTime;
use ota_core::store::UpdateStore;

pub async fn run_history(store: &UpdateStore) -> Result<()> {
    let rows = store.list_downloads().await?;
    if rows.is_empty() {
        println!("No downloads recorded.");
        return Ok(());
    }
    println!(
        "{:<5} {:<17} {:<19} {:<24} {}",
        "ID", "FINISHED", "OUTCOME", "BUILD", "PATH"
    );
    for r in rows {
        let finished = DateTime::from_timestamp(r.finished_at, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let build = match &r.version {
            Some(v) => format!("{} {}", r.name, v),
            None => r.name.clone(),
        };
        println!(
            "{:<5} {:<17} {:<19} {:<24} {}",
            r.id,
            finished,
            r.outcome,
            build,
            r.path.display()
        );
    }
    Ok(())
}
