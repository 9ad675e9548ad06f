//! One download per machine: an exclusive `flock(2)` on a file in the state
//! directory.
//!
//! The kernel drops the lock when the holder's descriptor closes, so a crashed
//! run never leaves a stale lock behind. The file carries the holder's pid for
//! error messages only; its contents never decide who owns the lock.

use anyhow::{bail, Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub struct JobLock {
    file: File,
    path: PathBuf,
}

impl JobLock {
    /// Lock `~/.local/state/ota/download.lock`.
    pub fn acquire_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("ota")?;
        let state_dir = xdg_dirs.get_state_home().join("ota");
        fs::create_dir_all(&state_dir)
            .with_context(|| format!("create state dir {}", state_dir.display()))?;
        Self::acquire(&state_dir.join("download.lock"))
    }

    pub fn acquire(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("open lock {}", path.display()))?;

        if !try_lock_exclusive(&file).with_context(|| format!("lock {}", path.display()))? {
            let holder = fs::read_to_string(path)
                .ok()
                .and_then(|s| s.trim().parse::<u32>().ok());
            match holder {
                Some(pid) => bail!(
                    "another download is in progress (pid {}, lock {})",
                    pid,
                    path.display()
                ),
                None => bail!("another download is in progress (lock {})", path.display()),
            }
        }

        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        tracing::debug!(path = %path.display(), "download lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for JobLock {
    fn drop(&mut self) {
        // The lock itself goes with the descriptor; only the pid is cleared.
        if let Err(e) = self.file.set_len(0) {
            tracing::warn!(path = %self.path.display(), "could not clear download lock: {}", e);
        }
    }
}

/// `Ok(false)` when another descriptor holds the lock.
#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let r = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if r == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> io::Result<bool> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "download lock not supported on this platform",
    ))
}
