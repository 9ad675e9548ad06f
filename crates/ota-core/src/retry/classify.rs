use crate::transport::FetchError;

/// Whether a transfer error might go away on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    /// Timeouts, dropped connections, short bodies and 5xx responses.
    Transient,
    /// 429 or 503.
    Throttled,
    /// 4xx, local I/O, malformed responses, cancellation.
    Permanent,
}

pub fn cause_of(err: &FetchError) -> Cause {
    match err {
        FetchError::Curl(e) if transient_curl(e) => Cause::Transient,
        FetchError::Http(429 | 503) => Cause::Throttled,
        FetchError::Http(500..=599) => Cause::Transient,
        FetchError::PartialTransfer { .. } => Cause::Transient,
        _ => Cause::Permanent,
    }
}

fn transient_curl(e: &curl::Error) -> bool {
    e.is_operation_timedout()
        || e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
}
