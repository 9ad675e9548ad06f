//! The build currently installed on the device, read from `build.prop`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::descriptor::{parse_build_date, BuildDescriptor};
use crate::freshness;

pub const PROP_ROM_ID: &str = "otaupdater.otaid";
pub const PROP_VERSION: &str = "otaupdater.otaver";
pub const PROP_TIME: &str = "otaupdater.otatime";
pub const PROP_DEVICE: &str = "ro.product.device";
pub const PROP_SDCARD_OS: &str = "otaupdater.sdcard.os";
pub const PROP_SDCARD_RECOVERY: &str = "otaupdater.sdcard.recovery";
pub const PROP_REBOOT_CMD: &str = "otaupdater.rebootcmd";
pub const PROP_NO_FLASH: &str = "otaupdater.noflash";

/// `key=value` pairs from a build property file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildProps {
    values: HashMap<String, String>,
}

impl BuildProps {
    /// Parse property text. `#` comments, blank lines and lines without `=` are skipped;
    /// a later duplicate key wins.
    pub fn parse(text: &str) -> Self {
        let mut values = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                values.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        Self { values }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read build properties {}", path.display()))?;
        Ok(Self::parse(&text))
    }

    /// Value for `key`; empty values count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Identity of the installed build. Read-only to the rest of the crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledState {
    pub version: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub device_id: String,
    pub build_id: Option<String>,
}

impl InstalledState {
    pub fn from_props(props: &BuildProps) -> Self {
        Self {
            version: props.get(PROP_VERSION).map(str::to_string),
            published_at: props.get(PROP_TIME).and_then(parse_build_date),
            device_id: props
                .get(PROP_DEVICE)
                .map(str::to_lowercase)
                .unwrap_or_default(),
            build_id: props.get(PROP_ROM_ID).map(str::to_string),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::from_props(&BuildProps::load(path)?))
    }

    /// Builds without a ROM id are not served by the update server.
    pub fn is_supported(&self) -> bool {
        self.build_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    pub fn is_update(&self, candidate: Option<&BuildDescriptor>) -> bool {
        freshness::is_update(candidate, self.version.as_deref(), self.published_at)
    }
}

/// Device-specific flashing properties, used by [`crate::install`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLayout {
    /// Name of the external storage as seen by the running OS.
    pub sdcard_os: String,
    /// Name of the same storage as seen by recovery.
    pub sdcard_recovery: String,
    pub reboot_cmd: String,
    pub no_flash: bool,
}

impl Default for DeviceLayout {
    fn default() -> Self {
        Self {
            sdcard_os: "sdcard".to_string(),
            sdcard_recovery: "sdcard".to_string(),
            reboot_cmd: "reboot recovery".to_string(),
            no_flash: false,
        }
    }
}

impl DeviceLayout {
    pub fn from_props(props: &BuildProps) -> Self {
        let defaults = Self::default();
        let or_default = |key: &str, fallback: String| {
            props.get(key).map(str::to_string).unwrap_or(fallback)
        };
        Self {
            sdcard_os: or_default(PROP_SDCARD_OS, defaults.sdcard_os),
            sdcard_recovery: or_default(PROP_SDCARD_RECOVERY, defaults.sdcard_recovery),
            reboot_cmd: or_default(PROP_REBOOT_CMD, defaults.reboot_cmd),
            no_flash: props
                .get(PROP_NO_FLASH)
                .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true")),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::from_props(&BuildProps::load(path)?))
    }

    /// Where recovery finds `path`: a leading `/<sdcard_os>` becomes
    /// `/<sdcard_recovery>`. Other paths are unchanged.
    pub fn recovery_path(&self, path: &Path) -> PathBuf {
        let os_root = Path::new("/").join(&self.sdcard_os);
        match path.strip_prefix(&os_root) {
            Ok(rest) => Path::new("/").join(&self.sdcard_recovery).join(rest),
            Err(_) => path.to_path_buf(),
        }
    }
}
