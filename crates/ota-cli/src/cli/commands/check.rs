//! `ota check <SOURCE>` – fetch a descriptor and compare it with the installed build.

use anyhow::Result;
use ota_core::check::{evaluate_fetched, load_descriptor, UpdaterState};
use ota_core::config::OtaConfig;
use ota_core::control::CancelToken;
use ota_core::transport::CurlTransport;

use super::print_report;

pub async fn run_check(state: &UpdaterState, cfg: &OtaConfig, source: &str) -> Result<()> {
    let transport = CurlTransport::from_config(cfg);
    let source_owned = source.to_string();
    let descriptor = tokio::task::spawn_blocking(move || {
        load_descriptor(&source_owned, &transport, &CancelToken::new())
    })
    .await??;
    tracing::debug!(?descriptor, "descriptor loaded");

    let report = evaluate_fetched(state, descriptor).await?;
    print_report(&report);
    Ok(())
}
