//! Remote build descriptors.
//!
//! A [`BuildDescriptor`] is what the update server publishes for the newest
//! build of a ROM: display name, optional version string, changelog, package
//! URL, the package's MD5 and an optional build timestamp.

mod slug;

pub use slug::{package_file_name, sanitize_filename, slugify};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checksum::is_hex_digest;

/// Build timestamp format used by build properties and descriptors (`20140131-2359`).
pub const BUILD_DATE_FORMAT: &str = "%Y%m%d-%H%M";

/// Errors turning remote data into a descriptor.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("descriptor has no download url")]
    MissingUrl,
    #[error("descriptor checksum is not a hex digest: {0:?}")]
    BadChecksum(String),
    #[error("invalid descriptor json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Immutable description of a candidate remote build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireDescriptor", into = "WireDescriptor")]
pub struct BuildDescriptor {
    pub name: String,
    pub version: Option<String>,
    pub changelog: String,
    pub url: String,
    /// Hex MD5 of the package, compared case-insensitively.
    pub checksum: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl BuildDescriptor {
    /// Parse the JSON document served by the update server.
    pub fn from_json(data: &[u8]) -> Result<Self, DescriptorError> {
        let wire: WireDescriptor = serde_json::from_slice(data)?;
        Self::try_from(wire)
    }

    pub fn to_json(&self) -> Result<String, DescriptorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Whether the comparator has anything to compare.
    pub fn is_comparable(&self) -> bool {
        self.version.is_some() || self.published_at.is_some()
    }

    /// File name the package is stored under in the download directory.
    pub fn package_file_name(&self) -> String {
        package_file_name(&self.name, self.version.as_deref())
    }

    /// `published_at` in [`BUILD_DATE_FORMAT`], if known.
    pub fn published_at_string(&self) -> Option<String> {
        self.published_at.map(format_build_date)
    }
}

/// Parse a build timestamp (`yyyyMMdd-HHmm`, UTC). Hour `24` is read as
/// midnight of the same day, as some build scripts emit a 1-24 hour clock.
pub fn parse_build_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let normalized = match s.split_once('-') {
        Some((day, time)) if time.starts_with("24") => format!("{}-00{}", day, &time[2..]),
        _ => s.to_string(),
    };
    match NaiveDateTime::parse_from_str(&normalized, BUILD_DATE_FORMAT) {
        Ok(naive) => Some(naive.and_utc()),
        Err(e) => {
            tracing::warn!(value = s, "unparseable build date: {}", e);
            None
        }
    }
}

pub fn format_build_date(date: DateTime<Utc>) -> String {
    date.format(BUILD_DATE_FORMAT).to_string()
}

/// JSON shape published by the update server.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireDescriptor {
    rom: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(default)]
    changelog: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    md5: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<String>,
}

impl TryFrom<WireDescriptor> for BuildDescriptor {
    type Error = DescriptorError;

    fn try_from(w: WireDescriptor) -> Result<Self, Self::Error> {
        let url = w.url.trim().to_string();
        if url.is_empty() {
            return Err(DescriptorError::MissingUrl);
        }
        if !is_hex_digest(&w.md5) {
            return Err(DescriptorError::BadChecksum(w.md5));
        }
        Ok(BuildDescriptor {
            name: w.rom,
            version: w.version.filter(|v| !v.trim().is_empty()),
            changelog: w.changelog,
            url,
            checksum: w.md5.trim().to_string(),
            published_at: w.date.as_deref().and_then(parse_build_date),
        })
    }
}

impl From<BuildDescriptor> for WireDescriptor {
    fn from(d: BuildDescriptor) -> Self {
        WireDescriptor {
            date: d.published_at_string(),
            rom: d.name,
            version: d.version,
            changelog: d.changelog,
            url: d.url,
            md5: d.checksum,
        }
    }
}
