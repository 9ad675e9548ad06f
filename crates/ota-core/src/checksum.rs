//! MD5 digests for downloaded packages.
//!
//! Build servers publish a hex MD5 next to every package, so that is what
//! we compute: either streamed over an existing file or incrementally while
//! the body is written.

use anyhow::{Context, Result};
use md5::{Digest, Md5};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Running MD5 over the chunks of a transfer.
#[derive(Clone, Default)]
pub struct RunningDigest {
    hasher: Md5,
}

impl RunningDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    /// Lowercase hex of the digest.
    pub fn finalize_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// Compute MD5 of a file and return the digest as lowercase hex.
/// Reads in chunks to keep memory use bounded; suitable for large files.
pub fn md5_path(path: &Path) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut digest = RunningDigest::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        digest.update(&buf[..n]);
    }
    Ok(digest.finalize_hex())
}

/// Case-insensitive hex digest comparison. Surrounding whitespace in the
/// published value is ignored.
pub fn digest_matches(expected: &str, actual: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(actual.trim())
}

/// True if `s` is a plausible hex digest (non-empty, hex digits only).
pub fn is_hex_digest(s: &str) -> bool {
    let s = s.trim();
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn md5_path_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let digest = md5_path(f.path()).unwrap();
        assert_eq!(digest, "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn md5_path_known_content() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        let digest = md5_path(f.path()).unwrap();
        assert_eq!(digest, "b1946ac92492d2347c6235b4d2611184");
    }

    #[test]
    fn running_digest_matches_whole_file_digest() {
        let mut running = RunningDigest::new();
        running.update(b"hel");
        running.update(b"lo\n");
        assert_eq!(running.finalize_hex(), "b1946ac92492d2347c6235b4d2611184");
    }

    #[test]
    fn digest_comparison_ignores_case() {
        assert!(digest_matches(
            "B1946AC92492D2347C6235B4D2611184",
            "b1946ac92492d2347c6235b4d2611184"
        ));
        assert!(!digest_matches("b1946ac9", "b1946ac92492d2347c6235b4d2611184"));
    }

    #[test]
    fn hex_digest_validation() {
        assert!(is_hex_digest("d41d8cd98f00b204e9800998ecf8427e"));
        assert!(is_hex_digest("ABCDEF"));
        assert!(!is_hex_digest(""));
        assert!(!is_hex_digest("xyz"));
    }
}
