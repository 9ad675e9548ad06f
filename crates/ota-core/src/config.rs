use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
///
/// Only the calling layer retries; the download manager itself never does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay before the first retry, in seconds.
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 2.0,
            max_delay_secs: 60,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// A host that serves an interstitial page first and the real artifact only
/// after a cooldown. Matches the host itself and any of its subdomains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedHostConfig {
    pub host: String,
    /// Delay between draining the interstitial and re-requesting, in milliseconds.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

fn default_cooldown_ms() -> u64 {
    10_500
}

/// Global configuration loaded from `~/.config/ota/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtaConfig {
    /// Where packages are downloaded (None = `~/.local/share/ota/download`).
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Build property file describing the installed build.
    pub build_prop: PathBuf,
    /// Transfer chunk size in bytes.
    pub chunk_size: usize,
    /// How long the keep-awake assertion lingers after a download finishes.
    pub wake_grace_ms: u64,
    /// Connection timeout for every request.
    pub connect_timeout_secs: u64,
    /// Abort a transfer that stays below 1 KiB/s for this many seconds.
    pub low_speed_secs: u64,
    /// Hosts that need the interstitial-then-cooldown fetch.
    #[serde(default)]
    pub staged_hosts: Vec<StagedHostConfig>,
    /// Optional retry policy for `ota download`; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for OtaConfig {
    fn default() -> Self {
        Self {
            download_dir: None,
            build_prop: PathBuf::from("/system/build.prop"),
            chunk_size: 4096,
            wake_grace_ms: 30_000,
            connect_timeout_secs: 30,
            low_speed_secs: 60,
            staged_hosts: vec![StagedHostConfig {
                host: "goo.im".to_string(),
                cooldown_ms: default_cooldown_ms(),
            }],
            retry: None,
        }
    }
}

impl OtaConfig {
    /// Download directory, falling back to the XDG data dir.
    pub fn resolve_download_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.download_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("ota")?;
        Ok(xdg_dirs.get_data_home().join("ota").join("download"))
    }

    pub fn wake_grace(&self) -> Duration {
        Duration::from_millis(self.wake_grace_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().unwrap_or_default().to_policy()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("ota")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<OtaConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = OtaConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: OtaConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = OtaConfig::default();
        assert_eq!(cfg.chunk_size, 4096);
        assert_eq!(cfg.wake_grace_ms, 30_000);
        assert_eq!(cfg.staged_hosts.len(), 1);
        assert_eq!(cfg.staged_hosts[0].host, "goo.im");
        assert_eq!(cfg.staged_hosts[0].cooldown_ms, 10_500);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = OtaConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: OtaConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.build_prop, cfg.build_prop);
        assert_eq!(parsed.chunk_size, cfg.chunk_size);
        assert_eq!(parsed.staged_hosts, cfg.staged_hosts);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            download_dir = "/tmp/ota"
            build_prop = "/etc/ota/build.prop"
            chunk_size = 65536
            wake_grace_ms = 1000
            connect_timeout_secs = 5
            low_speed_secs = 10

            [[staged_hosts]]
            host = "mirror.example.org"
        "#;
        let cfg: OtaConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.download_dir.as_deref(), Some(std::path::Path::new("/tmp/ota")));
        assert_eq!(cfg.chunk_size, 65536);
        assert_eq!(cfg.wake_grace(), Duration::from_secs(1));
        assert_eq!(cfg.staged_hosts[0].cooldown_ms, 10_500);
        assert!(cfg.retry.is_none());
    }

    #[test]
    fn config_toml_retry_section() {
        let toml = r#"
            build_prop = "/system/build.prop"
            chunk_size = 4096
            wake_grace_ms = 30000
            connect_timeout_secs = 30
            low_speed_secs = 60

            [retry]
            max_attempts = 4
            base_delay_secs = 0.5
            max_delay_secs = 15
        "#;
        let cfg: OtaConfig = toml::from_str(toml).unwrap();
        assert!(cfg.staged_hosts.is_empty());
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(15));
    }
}
