//! Free-space queries for the destination filesystem.

use std::io;
use std::path::Path;

/// Reports bytes available to an unprivileged writer on the filesystem holding `dir`.
pub trait SpaceProbe: Send + Sync {
    fn available_space(&self, dir: &Path) -> io::Result<u64>;
}

/// `statvfs(3)`-backed probe: `f_bavail * f_frsize`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatvfsProbe;

#[cfg(unix)]
impl SpaceProbe for StatvfsProbe {
    fn available_space(&self, dir: &Path) -> io::Result<u64> {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(dir.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let mut st: libc::statvfs = unsafe { std::mem::zeroed() };
        let r = unsafe { libc::statvfs(c_path.as_ptr(), &mut st) };
        if r != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok((st.f_bavail as u64).saturating_mul(st.f_frsize as u64))
    }
}

#[cfg(not(unix))]
impl SpaceProbe for StatvfsProbe {
    fn available_space(&self, _dir: &Path) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "free-space query not supported on this platform",
        ))
    }
}
