//! Sequential writer for a destination file that is removed unless committed.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Destination file being written by a transfer.
///
/// Dropping it without [`PartialFile::commit`] closes the handle and deletes
/// the file, so every early return leaves no partial artifact behind.
pub struct PartialFile {
    file: Option<File>,
    path: PathBuf,
    written: u64,
}

impl PartialFile {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
            written: 0,
        })
    }

    pub fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        match self.file.as_mut() {
            Some(f) => {
                f.write_all(data)?;
                self.written += data.len() as u64;
                Ok(())
            }
            None => Err(io::Error::new(io::ErrorKind::Other, "destination already closed")),
        }
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and sync the file and keep it on disk.
    pub fn commit(mut self) -> io::Result<()> {
        if let Some(mut f) = self.file.take() {
            f.flush()?;
            f.sync_all()?;
        }
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        // `file` is only still present when the writer was never committed.
        if let Some(f) = self.file.take() {
            drop(f);
            if let Err(e) = super::remove_if_exists(&self.path) {
                tracing::warn!(path = %self.path.display(), "could not delete partial file: {}", e);
            }
        }
    }
}
