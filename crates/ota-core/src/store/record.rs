//! Identity, stored update and settings.

use anyhow::Result;
use sqlx::Row;

use super::db::{unix_timestamp, UpdateStore};
use crate::descriptor::{format_build_date, parse_build_date, BuildDescriptor};
use crate::freshness::DeviceIdentity;

const SHOW_NOTIF: &str = "show_notif";
const IGNORED_DATA_WARN: &str = "ignored_data_warn";

impl UpdateStore {
    /// Identity recorded by the last [`set_values_to_current`](Self::set_values_to_current).
    pub async fn last_identity(&self) -> Result<Option<DeviceIdentity>> {
        let row = sqlx::query("SELECT version_code, device, rom_id FROM identity WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| {
            let version_code: i64 = row.get("version_code");
            DeviceIdentity {
                version_code: u32::try_from(version_code).unwrap_or(0),
                device: row.get("device"),
                rom_id: row.get("rom_id"),
            }
        }))
    }

    /// Record `current` as the last-seen identity.
    pub async fn set_values_to_current(&self, current: &DeviceIdentity) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO identity (id, version_code, device, rom_id)
            VALUES (1, ?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                version_code = excluded.version_code,
                device = excluded.device,
                rom_id = excluded.rom_id
            "#,
        )
        .bind(i64::from(current.version_code))
        .bind(current.device.as_deref())
        .bind(current.rom_id.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn stored_update(&self) -> Result<Option<BuildDescriptor>> {
        let row = sqlx::query(
            "SELECT rom, version, changelog, url, md5, date FROM stored_update WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| {
            let date: Option<String> = row.get("date");
            BuildDescriptor {
                name: row.get("rom"),
                version: row.get("version"),
                changelog: row.get("changelog"),
                url: row.get("url"),
                checksum: row.get("md5"),
                published_at: date.as_deref().and_then(parse_build_date),
            }
        }))
    }

    /// Replace the stored update with `descriptor`.
    pub async fn store_update(&self, descriptor: &BuildDescriptor) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stored_update (id, rom, version, changelog, url, md5, date, stored_at)
            VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                rom = excluded.rom,
                version = excluded.version,
                changelog = excluded.changelog,
                url = excluded.url,
                md5 = excluded.md5,
                date = excluded.date,
                stored_at = excluded.stored_at
            "#,
        )
        .bind(&descriptor.name)
        .bind(descriptor.version.as_deref())
        .bind(&descriptor.changelog)
        .bind(&descriptor.url)
        .bind(&descriptor.checksum)
        .bind(descriptor.published_at.map(format_build_date))
        .bind(unix_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn clear_stored_update(&self) -> Result<()> {
        sqlx::query("DELETE FROM stored_update")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Whether update notifications are shown. Defaults to true.
    pub async fn show_notif(&self) -> Result<bool> {
        self.get_flag(SHOW_NOTIF, true).await
    }

    pub async fn set_show_notif(&self, on: bool) -> Result<()> {
        self.set_flag(SHOW_NOTIF, on).await
    }

    /// Whether the user dismissed the mobile-data warning. Defaults to false.
    pub async fn ignored_data_warn(&self) -> Result<bool> {
        self.get_flag(IGNORED_DATA_WARN, false).await
    }

    pub async fn set_ignored_data_warn(&self, ignored: bool) -> Result<()> {
        self.set_flag(IGNORED_DATA_WARN, ignored).await
    }

    async fn get_flag(&self, key: &str, default: bool) -> Result<bool> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<i64, _>("value") != 0).unwrap_or(default))
    }

    async fn set_flag(&self, key: &str, value: bool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(i64::from(value))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
