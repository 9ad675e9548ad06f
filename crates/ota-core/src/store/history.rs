//! Download history.

use anyhow::Result;
use sqlx::Row;
use std::path::{Path, PathBuf};

use super::db::{unix_timestamp, UpdateStore};
use super::types::DownloadRecord;
use crate::descriptor::BuildDescriptor;
use crate::downloader::DownloadOutcome;

impl UpdateStore {
    /// Append the terminal outcome of a download. Returns the new row id.
    pub async fn record_download(
        &self,
        descriptor: &BuildDescriptor,
        path: &Path,
        outcome: &DownloadOutcome,
    ) -> Result<i64> {
        let id = sqlx::query(
            r#"
            INSERT INTO downloads (name, version, path, outcome, finished_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&descriptor.name)
        .bind(descriptor.version.as_deref())
        .bind(path.to_string_lossy().into_owned())
        .bind(outcome.as_str())
        .bind(unix_timestamp())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    /// All recorded downloads, newest first.
    pub async fn list_downloads(&self) -> Result<Vec<DownloadRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, version, path, outcome, finished_at
            FROM downloads
            ORDER BY finished_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let path: String = row.get("path");
            out.push(DownloadRecord {
                id: row.get("id"),
                name: row.get("name"),
                version: row.get("version"),
                path: PathBuf::from(path),
                outcome: row.get("outcome"),
                finished_at: row.get("finished_at"),
            });
        }
        Ok(out)
    }
}
