//! Destination file lifecycle and free-space probing.
//!
//! A package is written through a [`PartialFile`] that deletes itself unless
//! committed, so a destination path is either a verified file or absent.

mod partial;
mod space;

pub use partial::PartialFile;
pub use space::{SpaceProbe, StatvfsProbe};

use std::io;
use std::path::Path;

/// Delete `path` if it exists. Missing files are not an error.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "deleted file");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
