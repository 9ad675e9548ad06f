//! Network collaborator for the download manager.
//!
//! A [`Transport`] opens a GET to a URL and hands back a [`Response`] once the
//! final response headers have arrived; the body is then pulled in chunks.
//! The default implementation drives libcurl on a worker thread.

mod curl_easy;
mod parse;

pub use curl_easy::{CurlOptions, CurlTransport};

use crate::control::CancelToken;

/// Status line and the headers the download path cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u32,
    /// `Content-Length`, if the server sent one.
    pub content_length: Option<u64>,
}

impl ResponseHead {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure while talking to the remote side or writing what it sent.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// libcurl reported an error (timeout, connection, TLS, ...).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// The response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// Local I/O failed (destination write, free-space query, ...).
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// The response could not be understood.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// The body ended before `Content-Length` bytes arrived.
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    /// A blocking wait was abandoned because the cancel token was set.
    #[error("interrupted by cancellation")]
    Interrupted,
}

/// An open response whose body is read in chunks.
pub trait Response: Send {
    fn head(&self) -> ResponseHead;

    fn content_length(&self) -> Option<u64> {
        self.head().content_length
    }

    /// Copy the next piece of the body into `buf`. Returns `Ok(0)` at end of body.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, FetchError>;
}

/// Opens GET requests.
pub trait Transport: Send + Sync {
    /// Issue a GET for `url` and wait for the final (post-redirect) response headers.
    /// Non-2xx statuses are reported as [`FetchError::Http`]. Waiting stops with
    /// [`FetchError::Interrupted`] once `cancel` is set.
    fn open(&self, url: &str, cancel: &CancelToken) -> Result<Box<dyn Response>, FetchError>;
}

/// Read a whole (small) body into memory, refusing bodies larger than `limit`.
pub fn fetch_bytes(
    transport: &dyn Transport,
    url: &str,
    limit: usize,
    cancel: &CancelToken,
) -> Result<Vec<u8>, FetchError> {
    let mut response = transport.open(url, cancel)?;
    let mut out = Vec::new();
    let mut buf = vec![0u8; 16 * 1024];
    loop {
        let n = response.read_chunk(&mut buf)?;
        if n == 0 {
            break;
        }
        if out.len() + n > limit {
            return Err(FetchError::Malformed(format!(
                "body exceeds {} byte limit",
                limit
            )));
        }
        out.extend_from_slice(&buf[..n]);
    }
    Ok(out)
}
