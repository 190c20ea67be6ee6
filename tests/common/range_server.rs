//! Minimal HTTP/1.1 server that supports GET with open-ended Range for integration tests.
//!
//! Serves a single body. A GET without Range returns 200 with the full body;
//! `Range: bytes=N-` returns 206 from N to the end. Every request is logged,
//! and the ETag and body can be changed while the server runs. Faults can be
//! queued for upcoming ranged requests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RangeServerOptions {
    /// If false, omit `Accept-Ranges: bytes`.
    pub advertise_ranges: bool,
    /// ETag sent with every response; `None` omits the header.
    pub etag: Option<String>,
    /// If false, ignore `Range` and always answer 200 with the full body.
    pub honor_ranges: bool,
}

/// Misbehaviour applied to one ranged request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Answer with this status, no ETag and an empty body.
    Status(u16),
    /// Answer 206 with the body from offset 0, whatever range was asked for.
    WrongRange,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            advertise_ranges: true,
            etag: Some("\"abc\"".to_string()),
            honor_ranges: true,
        }
    }
}

/// One request as seen by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedRequest {
    pub method: String,
    /// Start offset of `Range: bytes=N-`, if present.
    pub range_start: Option<u64>,
}

struct State {
    body: Mutex<Vec<u8>>,
    etag: Mutex<Option<String>>,
    advertise_ranges: bool,
    honor_ranges: bool,
    faults: Mutex<VecDeque<Fault>>,
    log: Mutex<Vec<LoggedRequest>>,
}

pub struct RangeServer {
    url: String,
    state: Arc<State>,
}

impl RangeServer {
    /// Starts a server in a background thread serving `body` with ETag `"abc"`.
    pub fn start(body: Vec<u8>) -> Self {
        Self::start_with_options(body, RangeServerOptions::default())
    }

    pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(State {
            body: Mutex::new(body),
            etag: Mutex::new(opts.etag),
            advertise_ranges: opts.advertise_ranges,
            honor_ranges: opts.honor_ranges,
            faults: Mutex::new(VecDeque::new()),
            log: Mutex::new(Vec::new()),
        });

        let server_state = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&server_state);
                thread::spawn(move || handle(stream, &state));
            }
        });

        Self {
            url: format!("http://127.0.0.1:{}/archive.zip", port),
            state,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_etag(&self, etag: Option<&str>) {
        *self.state.etag.lock().unwrap() = etag.map(str::to_owned);
    }

    /// Shrink the served body without touching the ETag.
    pub fn truncate(&self, len: usize) {
        self.state.body.lock().unwrap().truncate(len);
    }

    /// Apply `fault` to the next ranged request that has no fault yet.
    pub fn inject(&self, fault: Fault) {
        self.state.faults.lock().unwrap().push_back(fault);
    }

    pub fn requests(&self) -> Vec<LoggedRequest> {
        self.state.log.lock().unwrap().clone()
    }

    /// Start offsets of all ranged requests, in arrival order.
    pub fn range_starts(&self) -> Vec<u64> {
        self.requests()
            .iter()
            .filter_map(|r| r.range_start)
            .collect()
    }
}

fn handle(mut stream: TcpStream, state: &State) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));

    let Some(head) = read_head(&mut stream) else {
        return;
    };
    let (method, range_start) = parse_request(&head);
    state.log.lock().unwrap().push(LoggedRequest {
        method: method.to_string(),
        range_start,
    });

    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    }

    let fault = match range_start {
        Some(_) => state.faults.lock().unwrap().pop_front(),
        None => None,
    };
    if let Some(Fault::Status(code)) = fault {
        let response = format!(
            "HTTP/1.1 {} Injected Failure\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            code
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    let body = state.body.lock().unwrap().clone();
    let etag = state.etag.lock().unwrap().clone();
    let total = body.len() as u64;

    let mut headers = String::new();
    if let Some(etag) = etag {
        headers.push_str(&format!("ETag: {}\r\n", etag));
    }
    if state.advertise_ranges {
        headers.push_str("Accept-Ranges: bytes\r\n");
    }

    let range_start = match fault {
        Some(Fault::WrongRange) => Some(0),
        _ => range_start.filter(|_| state.honor_ranges),
    };
    let (status, slice) = match range_start {
        None => ("200 OK".to_string(), &body[..]),
        Some(start) if start >= total => {
            headers.push_str(&format!("Content-Range: bytes */{}\r\n", total));
            ("416 Range Not Satisfiable".to_string(), &body[0..0])
        }
        Some(start) => {
            headers.push_str(&format!(
                "Content-Range: bytes {}-{}/{}\r\n",
                start,
                total - 1,
                total
            ));
            ("206 Partial Content".to_string(), &body[start as usize..])
        }
    };

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
        status,
        slice.len(),
        headers
    );
    // The client may hang up early once it has what it needs.
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(slice);
}

/// Reads until the end of the request head.
fn read_head(stream: &mut TcpStream) -> Option<String> {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return None,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
        if head.len() > 64 * 1024 {
            return None;
        }
    }
    String::from_utf8(head).ok()
}

/// Returns (method, optional start of `Range: bytes=N-`).
fn parse_request(request: &str) -> (&str, Option<u64>) {
    let mut lines = request.lines();
    let method = lines
        .next()
        .and_then(|l| l.split_whitespace().next())
        .unwrap_or("");
    let mut range = None;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                let value = value.trim().to_ascii_lowercase();
                if let Some(spec) = value.strip_prefix("bytes=") {
                    if let Some((start, _)) = spec.split_once('-') {
                        range = start.trim().parse::<u64>().ok();
                    }
                }
            }
        }
    }
    (method, range)
}
