//! libcurl-backed transport.
//!
//! Each request runs `Easy::perform` on its own thread. Header lines are
//! collected until the first body byte (or the end of the transfer), then the
//! parsed head and every body chunk are forwarded over a bounded channel so
//! the caller pulls the body at its own pace. The progress callback aborts the
//! transfer once the cancel token is set or the response has been dropped,
//! which interrupts a read on a stalled connection within about a second.

use std::cell::{Cell, RefCell};
use std::str;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use curl::easy::Easy;

use super::parse::parse_head;
use super::{FetchError, Response, ResponseHead, Transport};
use crate::config::OtaConfig;
use crate::control::{CancelToken, POLL_INTERVAL};

/// Body chunks buffered between the curl thread and the reader.
const CHANNEL_DEPTH: usize = 64;

/// Timeouts and redirect limits applied to every request.
#[derive(Debug, Clone, Copy)]
pub struct CurlOptions {
    pub connect_timeout: Duration,
    /// Abort when the rate stays below 1 KiB/s for this long.
    pub low_speed_time: Duration,
    pub max_redirections: u32,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            low_speed_time: Duration::from_secs(60),
            max_redirections: 10,
        }
    }
}

/// [`Transport`] implementation on top of the curl crate.
#[derive(Debug, Clone, Default)]
pub struct CurlTransport {
    opts: CurlOptions,
}

impl CurlTransport {
    pub fn new(opts: CurlOptions) -> Self {
        Self { opts }
    }

    pub fn from_config(cfg: &OtaConfig) -> Self {
        Self::new(CurlOptions {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            low_speed_time: Duration::from_secs(cfg.low_speed_secs),
            ..CurlOptions::default()
        })
    }
}

enum Message {
    Head(ResponseHead),
    Data(Vec<u8>),
    Done,
    Failed(FetchError),
}

impl Transport for CurlTransport {
    fn open(&self, url: &str, cancel: &CancelToken) -> Result<Box<dyn Response>, FetchError> {
        let (tx, rx) = mpsc::sync_channel(CHANNEL_DEPTH);
        let closed = Arc::new(AtomicBool::new(false));
        let worker = {
            let url = url.to_string();
            let opts = self.opts;
            let cancel = cancel.clone();
            let closed = Arc::clone(&closed);
            std::thread::Builder::new()
                .name("ota-curl".into())
                .spawn(move || {
                    let last = match perform(&url, opts, &tx, &cancel, &closed) {
                        Ok(()) => Message::Done,
                        Err(_) if cancel.is_cancelled() => Message::Failed(FetchError::Interrupted),
                        Err(e) => Message::Failed(e),
                    };
                    let _ = tx.send(last);
                })?
        };

        let mut response = CurlResponse {
            rx: Some(rx),
            worker: Some(worker),
            closed,
            cancel: cancel.clone(),
            head: ResponseHead {
                status: 0,
                content_length: None,
            },
            pending: Vec::new(),
            pos: 0,
            finished: false,
        };

        let head = match response.recv()? {
            Message::Head(head) => head,
            Message::Failed(e) => return Err(e),
            Message::Data(_) | Message::Done => {
                return Err(FetchError::Malformed("body arrived before headers".into()))
            }
        };
        if head.status == 0 {
            return Err(FetchError::Malformed("missing status line".into()));
        }
        if !head.is_success() {
            return Err(FetchError::Http(head.status));
        }
        tracing::debug!(url, status = head.status, content_length = ?head.content_length, "response headers received");
        response.head = head;
        Ok(Box::new(response))
    }
}

/// Runs one GET to completion on the calling thread, forwarding to `tx`.
fn perform(
    url: &str,
    opts: CurlOptions,
    tx: &SyncSender<Message>,
    cancel: &CancelToken,
    closed: &AtomicBool,
) -> Result<(), FetchError> {
    let mut easy = Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(opts.max_redirections)?;
    easy.connect_timeout(opts.connect_timeout)?;
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(opts.low_speed_time)?;
    easy.progress(true)?;

    let lines = RefCell::new(Vec::<String>::new());
    let head_sent = Cell::new(false);
    let send_head = || -> bool {
        if head_sent.get() {
            return true;
        }
        head_sent.set(true);
        tx.send(Message::Head(parse_head(&lines.borrow()))).is_ok()
    };

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                let line = s.trim_end();
                // Every status line starts a new response (redirects, 100-continue).
                if line.starts_with("HTTP/") {
                    lines.borrow_mut().clear();
                }
                lines.borrow_mut().push(line.to_string());
            }
            true
        })?;
        transfer.write_function(|data| {
            if !send_head() || tx.send(Message::Data(data.to_vec())).is_err() {
                return Ok(0); // reader gone: abort transfer
            }
            Ok(data.len())
        })?;
        transfer.progress_function(|_, _, _, _| {
            !(cancel.is_cancelled() || closed.load(Ordering::Relaxed))
        })?;
        transfer.perform()?;
    }

    // Empty bodies never reach the write callback.
    send_head();
    Ok(())
}

struct CurlResponse {
    rx: Option<Receiver<Message>>,
    worker: Option<JoinHandle<()>>,
    closed: Arc<AtomicBool>,
    cancel: CancelToken,
    head: ResponseHead,
    pending: Vec<u8>,
    pos: usize,
    finished: bool,
}

impl CurlResponse {
    fn recv(&self) -> Result<Message, FetchError> {
        let rx = self
            .rx
            .as_ref()
            .ok_or_else(|| FetchError::Malformed("response already closed".into()))?;
        loop {
            if self.cancel.is_cancelled() {
                return Err(FetchError::Interrupted);
            }
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(m) => return Ok(m),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(FetchError::Malformed(
                        "transfer thread exited without a result".into(),
                    ))
                }
            }
        }
    }
}

impl Response for CurlResponse {
    fn head(&self) -> ResponseHead {
        self.head
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, FetchError> {
        loop {
            if self.pos < self.pending.len() {
                let n = (self.pending.len() - self.pos).min(buf.len());
                buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }
            match self.recv()? {
                Message::Data(data) => {
                    self.pending = data;
                    self.pos = 0;
                }
                Message::Done => self.finished = true,
                Message::Failed(e) => {
                    self.finished = true;
                    return Err(e);
                }
                Message::Head(_) => {
                    return Err(FetchError::Malformed("duplicate response headers".into()))
                }
            }
        }
    }
}

impl Drop for CurlResponse {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Relaxed);
        // Unblocks a worker waiting on a full channel.
        drop(self.rx.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
