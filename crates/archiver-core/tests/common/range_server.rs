//! Minimal HTTP/1.1 server that supports HEAD and Range GET for integration tests.
//!
//! Serves a single static body at `/file.bin`. `/redirect` answers 302 to the
//! file and `/loop` redirects to itself. Every response closes the connection.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// If false, omit `Accept-Ranges: bytes` header even if ranges work.
    pub advertise_ranges: bool,
    /// GETs whose range starts here always get 503.
    pub fail_range_start: Option<u64>,
    /// Hold every GET this long before answering, so overlapping fetches show
    /// up in [`RangeServer::peak_in_flight`].
    pub hold_gets: Option<Duration>,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            advertise_ranges: true,
            fail_range_start: None,
            hold_gets: None,
        }
    }
}

/// Handle to a running server. The server runs until the process exits.
#[derive(Clone)]
pub struct RangeServer {
    base: String,
    heads: Arc<AtomicUsize>,
    gets: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl RangeServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path.trim_start_matches('/'))
    }

    pub fn file_url(&self) -> String {
        self.url("file.bin")
    }

    pub fn head_count(&self) -> usize {
        self.heads.load(Ordering::SeqCst)
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Highest number of GETs being served at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Starts a server in a background thread serving `body`.
pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

/// Like `start` but allows customizing server behavior (ranges missing, failing chunk, ...).
pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let server = RangeServer {
        base: format!("http://127.0.0.1:{}/", port),
        heads: Arc::new(AtomicUsize::new(0)),
        gets: Arc::new(AtomicUsize::new(0)),
        in_flight: Arc::new(AtomicUsize::new(0)),
        peak: Arc::new(AtomicUsize::new(0)),
    };
    let body = Arc::new(body);
    let counters = server.clone();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let counters = counters.clone();
            thread::spawn(move || handle(stream, &body, opts, &counters));
        }
    });
    server
}

fn read_request(stream: &mut TcpStream) -> Option<String> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    while !data.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > 64 * 1024 {
            return None;
        }
    }
    String::from_utf8(data).ok()
}

fn respond(stream: &mut TcpStream, status: &str, headers: &[String], body: &[u8]) {
    let mut head = format!("HTTP/1.1 {}\r\nConnection: close\r\n", status);
    for h in headers {
        head.push_str(h);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
    let _ = stream.flush();
}

fn handle(mut stream: TcpStream, body: &[u8], opts: RangeServerOptions, counters: &RangeServer) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(request) = read_request(&mut stream) else {
        return;
    };
    let (method, path, range) = parse_request(&request);
    let is_head = method.eq_ignore_ascii_case("HEAD");
    let is_get = method.eq_ignore_ascii_case("GET");
    if is_head {
        counters.heads.fetch_add(1, Ordering::SeqCst);
        serve(&mut stream, path, true, range, body, opts);
    } else if is_get {
        counters.gets.fetch_add(1, Ordering::SeqCst);
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(hold) = opts.hold_gets {
            thread::sleep(hold);
        }
        // Leave before answering: the client can only reuse its slot after it
        // has read the reply.
        counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        serve(&mut stream, path, false, range, body, opts);
    } else {
        respond(&mut stream, "405 Method Not Allowed", &[], b"");
    }
}

fn serve(
    stream: &mut TcpStream,
    path: &str,
    is_head: bool,
    range: Option<(u64, u64)>,
    body: &[u8],
    opts: RangeServerOptions,
) {
    match path {
        "/redirect" => {
            respond(
                stream,
                "302 Found",
                &["Location: /file.bin".to_string(), "Content-Length: 0".to_string()],
                b"",
            );
            return;
        }
        "/loop" => {
            respond(
                stream,
                "302 Found",
                &["Location: /loop".to_string(), "Content-Length: 0".to_string()],
                b"",
            );
            return;
        }
        "/file.bin" => {}
        _ => {
            respond(stream, "404 Not Found", &["Content-Length: 0".to_string()], b"");
            return;
        }
    }

    let total = body.len() as u64;
    let mut headers = vec![];
    if opts.advertise_ranges {
        headers.push("Accept-Ranges: bytes".to_string());
    }

    if is_head {
        headers.push(format!("Content-Length: {}", total));
        respond(stream, "200 OK", &headers, b"");
        return;
    }

    match range {
        Some((start, _)) if opts.fail_range_start == Some(start) => {
            let msg = b"temporarily unavailable";
            headers.push(format!("Content-Length: {}", msg.len()));
            respond(stream, "503 Service Unavailable", &headers, msg);
        }
        Some((start, end_incl)) if opts.support_ranges => {
            let end_incl = end_incl.min(total.saturating_sub(1));
            if start > end_incl {
                headers.push(format!("Content-Range: bytes */{}", total));
                headers.push("Content-Length: 0".to_string());
                respond(stream, "416 Range Not Satisfiable", &headers, b"");
                return;
            }
            let slice = &body[start as usize..=end_incl as usize];
            headers.push(format!("Content-Range: bytes {}-{}/{}", start, end_incl, total));
            headers.push(format!("Content-Length: {}", slice.len()));
            respond(stream, "206 Partial Content", &headers, slice);
        }
        _ => {
            headers.push(format!("Content-Length: {}", total));
            respond(stream, "200 OK", &headers, body);
        }
    }
}

/// Returns (method, path, optional (start, end_inclusive) for Range: bytes=X-Y).
fn parse_request(request: &str) -> (&str, &str, Option<(u64, u64)>) {
    let mut lines = request.lines();
    let mut first = lines.next().unwrap_or("").split_whitespace();
    let method = first.next().unwrap_or("");
    let path = first.next().unwrap_or("");
    let mut range = None;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                let value = value.trim();
                if let Some(spec) = value.strip_prefix("bytes=") {
                    if let Some((a, b)) = spec.split_once('-') {
                        let start = a.trim().parse::<u64>().unwrap_or(0);
                        let end_incl = b.trim().parse::<u64>().unwrap_or(u64::MAX);
                        range = Some((start, end_incl));
                    }
                }
            }
        }
    }
    (method, path, range)
}
