//! Keep-awake assertions held while a package downloads.
//!
//! A download holds an [`AwakeGuard`] from start to finish. When the job
//! reaches a terminal state the same guard is handed to [`AwakeGuard::linger`],
//! which keeps the assertion for a grace period and then releases it, so the
//! machine never drops the assertion between the transfer and the grace window.

use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;

/// Source of keep-awake assertions.
pub trait KeepAwake: Send + Sync {
    /// Assert that the machine should stay awake until the guard is dropped.
    fn acquire(&self, reason: &str) -> AwakeGuard;
}

/// A held assertion. Released when dropped.
pub struct AwakeGuard {
    hold: Option<Box<dyn Send>>,
}

impl AwakeGuard {
    /// Wrap any value whose `Drop` releases the underlying assertion.
    pub fn new(hold: impl Send + 'static) -> Self {
        Self {
            hold: Some(Box::new(hold)),
        }
    }

    /// Keep holding for `grace`, then release on a background thread.
    /// Returns the handle of the releasing thread (None if `grace` is zero).
    pub fn linger(self, grace: Duration) -> Option<JoinHandle<()>> {
        if grace.is_zero() {
            drop(self);
            return None;
        }
        let handle = std::thread::Builder::new()
            .name("ota-awake-linger".into())
            .spawn(move || {
                std::thread::sleep(grace);
                drop(self);
            });
        match handle {
            Ok(h) => Some(h),
            Err(e) => {
                // The guard moved into the failed closure and is dropped with it.
                tracing::warn!("could not spawn keep-awake linger thread: {}", e);
                None
            }
        }
    }
}

impl Drop for AwakeGuard {
    fn drop(&mut self) {
        drop(self.hold.take());
    }
}

/// Holds a logind inhibitor lock by running `systemd-inhibit ... sleep infinity`
/// for the lifetime of the guard. Falls back to a log-only hold when the helper
/// cannot be started (containers, non-systemd hosts).
#[derive(Debug, Clone)]
pub struct InhibitKeepAwake {
    program: String,
    what: String,
}

impl Default for InhibitKeepAwake {
    fn default() -> Self {
        Self {
            program: "systemd-inhibit".to_string(),
            what: "idle:sleep".to_string(),
        }
    }
}

struct InhibitorProcess(Child);

impl Drop for InhibitorProcess {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
        tracing::debug!("keep-awake inhibitor released");
    }
}

impl KeepAwake for InhibitKeepAwake {
    fn acquire(&self, reason: &str) -> AwakeGuard {
        let spawned = Command::new(&self.program)
            .arg(format!("--what={}", self.what))
            .arg("--who=ota")
            .arg(format!("--why={}", reason))
            .arg("--mode=block")
            .args(["sleep", "infinity"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(child) => {
                tracing::debug!(pid = child.id(), "keep-awake inhibitor acquired");
                AwakeGuard::new(InhibitorProcess(child))
            }
            Err(e) => {
                tracing::debug!("{} unavailable ({}), keep-awake is log-only", self.program, e);
                LogOnlyKeepAwake.acquire(reason)
            }
        }
    }
}

/// Keep-awake that only logs acquire/release.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnlyKeepAwake;

struct LoggedHold(String);

impl Drop for LoggedHold {
    fn drop(&mut self) {
        tracing::debug!(reason = %self.0, "keep-awake released");
    }
}

impl KeepAwake for LogOnlyKeepAwake {
    fn acquire(&self, reason: &str) -> AwakeGuard {
        tracing::debug!(reason, "keep-awake acquired");
        AwakeGuard::new(LoggedHold(reason.to_string()))
    }
}
