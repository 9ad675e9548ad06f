//! Rows returned by the update store.

use std::path::PathBuf;

/// One finished download, as listed by `ota history`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    pub id: i64,
    pub name: String,
    pub version: Option<String>,
    pub path: PathBuf,
    /// [`DownloadOutcome::as_str`](crate::downloader::DownloadOutcome::as_str) of the result.
    pub outcome: String,
    /// Unix seconds.
    pub finished_at: i64,
}
