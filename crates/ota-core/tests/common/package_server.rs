//! Minimal HTTP/1.1 server for download integration tests.
//!
//! Each accepted request is answered with the next scripted [`Reply`]; once
//! the script runs out the last reply repeats. The server counts requests so
//! tests can assert how often the network was touched.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub enum Reply {
    /// 200 with Content-Length and the whole body.
    Body(Vec<u8>),
    /// 200 without Content-Length; the connection is closed after the body.
    NoLength(Vec<u8>),
    /// Advertises the full length but closes after `send` bytes.
    Short { body: Vec<u8>, send: usize },
    /// Advertises the full length, sends `send` bytes, then goes silent.
    Stall { body: Vec<u8>, send: usize },
    /// Bare status line with an empty body.
    Status(u16),
}

pub struct PackageServer {
    pub url: String,
    hits: Arc<AtomicUsize>,
}

impl PackageServer {
    /// Requests served so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start a server on a random local port. `path` is appended to the base URL.
pub fn start(path: &str, script: Vec<Reply>) -> PackageServer {
    assert!(!script.is_empty(), "script needs at least one reply");
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let hits = Arc::new(AtomicUsize::new(0));
    let script = Arc::new(script);
    {
        let hits = Arc::clone(&hits);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let n = hits.fetch_add(1, Ordering::SeqCst);
                let reply = script[n.min(script.len() - 1)].clone();
                thread::spawn(move || handle(stream, reply));
            }
        });
    }
    PackageServer {
        url: format!("http://127.0.0.1:{}/{}", port, path.trim_start_matches('/')),
        hits,
    }
}

fn handle(mut stream: TcpStream, reply: Reply) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(_) => {}
    }

    match reply {
        Reply::Body(body) => {
            let _ = write_head(&mut stream, "200 OK", Some(body.len()));
            let _ = stream.write_all(&body);
        }
        Reply::NoLength(body) => {
            let _ = write_head(&mut stream, "200 OK", None);
            let _ = stream.write_all(&body);
        }
        Reply::Short { body, send } => {
            let _ = write_head(&mut stream, "200 OK", Some(body.len()));
            let _ = stream.write_all(&body[..send.min(body.len())]);
        }
        Reply::Stall { body, send } => {
            let _ = write_head(&mut stream, "200 OK", Some(body.len()));
            let _ = stream.write_all(&body[..send.min(body.len())]);
            let _ = stream.flush();
            // Hold the connection until the client hangs up (or 30s pass).
            let _ = stream.set_read_timeout(Some(Duration::from_millis(100)));
            let deadline = Instant::now() + Duration::from_secs(30);
            while Instant::now() < deadline {
                match stream.read(&mut buf) {
                    Ok(0) => return,
                    Ok(_) => {}
                    Err(_) => {}
                }
            }
        }
        Reply::Status(code) => {
            let _ = write!(
                stream,
                "HTTP/1.1 {} Test\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                code
            );
        }
    }
}

fn write_head(stream: &mut TcpStream, status: &str, length: Option<usize>) -> std::io::Result<()> {
    let length = match length {
        Some(n) => format!("Content-Length: {}\r\n", n),
        None => String::new(),
    };
    write!(
        stream,
        "HTTP/1.1 {}\r\n{}Content-Type: application/zip\r\nConnection: close\r\n\r\n",
        status, length
    )
}
