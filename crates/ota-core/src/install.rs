//! Handing a downloaded package to recovery.
//!
//! The device's build properties say how: `otaupdater.rebootcmd` is run
//! (through `sh`) before the reboot into recovery, `$$NULL$$` skips it, and
//! `otaupdater.noflash` forbids flashing from the updater altogether.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use crate::checksum::{digest_matches, md5_path};
use crate::installed::DeviceLayout;

/// `otaupdater.rebootcmd` value meaning "no pre-reboot command".
pub const NO_COMMAND: &str = "$$NULL$$";
/// Environment variable carrying the package path as recovery sees it.
pub const PACKAGE_ENV: &str = "OTA_PACKAGE";

const REBOOT_RECOVERY: [&str; 2] = ["reboot", "recovery"];

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("flashing from the updater is disabled on this device (otaupdater.noflash)")]
    FlashingDisabled,
    #[error("{0} is not a file")]
    NotAFile(PathBuf),
    #[error("package checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error("`{command}` failed: {status}")]
    CommandFailed { command: String, status: ExitStatus },
    #[error("could not hash package: {0:#}")]
    Hash(anyhow::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The commands that reboot into recovery with `package` ready to flash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    pub package: PathBuf,
    pub recovery_path: PathBuf,
    pub commands: Vec<Vec<String>>,
}

impl InstallPlan {
    pub fn new(layout: &DeviceLayout, package: &Path) -> Result<Self, InstallError> {
        if layout.no_flash {
            return Err(InstallError::FlashingDisabled);
        }
        if !package.is_file() {
            return Err(InstallError::NotAFile(package.to_path_buf()));
        }

        let mut commands = Vec::new();
        let custom = layout.reboot_cmd.trim();
        if !custom.is_empty() && custom != NO_COMMAND {
            if custom.ends_with(".sh") {
                commands.push(vec!["sh".to_string(), custom.to_string()]);
            } else {
                commands.push(vec!["sh".to_string(), "-c".to_string(), custom.to_string()]);
            }
        }
        if custom != REBOOT_RECOVERY.join(" ") {
            commands.push(REBOOT_RECOVERY.iter().map(|s| s.to_string()).collect());
        }

        Ok(Self {
            package: package.to_path_buf(),
            recovery_path: layout.recovery_path(package),
            commands,
        })
    }

    /// Run each command in order with [`PACKAGE_ENV`] set. Stops at the first failure.
    pub fn run(&self) -> Result<(), InstallError> {
        for argv in &self.commands {
            let Some((program, args)) = argv.split_first() else {
                continue;
            };
            tracing::info!(command = %argv.join(" "), package = %self.recovery_path.display(), "install step");
            let status = Command::new(program)
                .args(args)
                .env(PACKAGE_ENV, &self.recovery_path)
                .status()?;
            if !status.success() {
                return Err(InstallError::CommandFailed {
                    command: argv.join(" "),
                    status,
                });
            }
        }
        Ok(())
    }
}

/// Refuse a package whose MD5 differs from `expected`.
pub fn verify_package(package: &Path, expected: &str) -> Result<(), InstallError> {
    let actual = md5_path(package).map_err(InstallError::Hash)?;
    if digest_matches(expected, &actual) {
        Ok(())
    } else {
        Err(InstallError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(reboot_cmd: &str) -> DeviceLayout {
        DeviceLayout {
            reboot_cmd: reboot_cmd.to_string(),
            ..DeviceLayout::default()
        }
    }

    fn package() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rom.zip");
        std::fs::write(&path, b"package").unwrap();
        (dir, path)
    }

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_command_reboots_once() {
        let (_dir, pkg) = package();
        let plan = InstallPlan::new(&DeviceLayout::default(), &pkg).unwrap();
        assert_eq!(
            plan.commands,
            vec![argv(&["sh", "-c", "reboot recovery"])]
        );
    }

    #[test]
    fn script_runs_with_sh_then_reboots() {
        let (_dir, pkg) = package();
        let plan = InstallPlan::new(&layout("/system/bin/flash.sh"), &pkg).unwrap();
        assert_eq!(
            plan.commands,
            vec![argv(&["sh", "/system/bin/flash.sh"]), argv(&["reboot", "recovery"])]
        );
    }

    #[test]
    fn null_command_only_reboots() {
        let (_dir, pkg) = package();
        let plan = InstallPlan::new(&layout(NO_COMMAND), &pkg).unwrap();
        assert_eq!(plan.commands, vec![argv(&["reboot", "recovery"])]);
    }

    #[test]
    fn noflash_refuses() {
        let (_dir, pkg) = package();
        let no_flash = DeviceLayout {
            no_flash: true,
            ..DeviceLayout::default()
        };
        assert!(matches!(
            InstallPlan::new(&no_flash, &pkg),
            Err(InstallError::FlashingDisabled)
        ));
    }

    #[test]
    fn missing_package_refused() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            InstallPlan::new(&DeviceLayout::default(), &dir.path().join("gone.zip")),
            Err(InstallError::NotAFile(_))
        ));
    }

    #[test]
    fn run_passes_package_and_stops_on_failure() {
        let (dir, pkg) = package();
        let seen = dir.path().join("seen");
        let plan = InstallPlan {
            package: pkg.clone(),
            recovery_path: PathBuf::from("/emmc/ota/rom.zip"),
            commands: vec![
                argv(&["sh", "-c", &format!("echo \"${}\" > {}", PACKAGE_ENV, seen.display())]),
                argv(&["false"]),
                argv(&["sh", "-c", &format!("echo again >> {}", seen.display())]),
            ],
        };
        let err = plan.run().unwrap_err();
        assert!(matches!(err, InstallError::CommandFailed { .. }));
        assert_eq!(
            std::fs::read_to_string(&seen).unwrap().trim(),
            "/emmc/ota/rom.zip"
        );
    }

    #[test]
    fn verify_package_checks_md5() {
        let (_dir, pkg) = package();
        let good = md5_path(&pkg).unwrap();
        assert!(verify_package(&pkg, &good.to_uppercase()).is_ok());
        assert!(matches!(
            verify_package(&pkg, "d41d8cd98f00b204e9800998ecf8427e"),
            Err(InstallError::ChecksumMismatch { .. })
        ));
    }
}
