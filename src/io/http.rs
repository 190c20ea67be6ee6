use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT_RANGES, CONTENT_RANGE, ETAG, HeaderMap, HeaderName, RANGE};
use reqwest::{Client, Response, StatusCode};
use tracing::debug;

use super::ReadAt;
use crate::error::{RangeError, Result};

/// Random-access reader over a remote resource served with HTTP Range support.
///
/// The constructor probes the resource once to learn its length and ETag.
/// Reads then go through a single open-ended range response that is kept
/// while reads stay sequential and replaced whenever a read jumps elsewhere.
/// Every range response must carry the ETag seen by the probe.
pub struct HttpRangeReader {
    client: Client,
    url: String,
    content_length: u64,
    etag: String,
    stream: Option<ActiveStream>,
    /// ETag observed on the response that broke consistency, if any.
    changed_etag: Option<Option<String>>,
    range_requests: u64,
    transferred_bytes: u64,
}

/// The currently open range response.
struct ActiveStream {
    response: Response,
    pending: Bytes,
    /// Resource offset of the next byte this stream yields.
    offset: u64,
}

impl ActiveStream {
    /// Fill `buf` completely from the body, or report how far it got.
    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            if self.pending.is_empty() {
                match self.response.chunk().await {
                    Ok(Some(chunk)) => self.pending = chunk,
                    Ok(None) => {
                        return Err(RangeError::ShortRead {
                            offset: self.offset,
                            requested: buf.len(),
                            read: filled,
                        });
                    }
                    Err(source) => {
                        return Err(RangeError::Body {
                            read: filled,
                            source,
                        });
                    }
                }
                continue;
            }

            let n = self.pending.len().min(buf.len() - filled);
            let chunk = self.pending.split_to(n);
            buf[filled..filled + n].copy_from_slice(&chunk);
            filled += n;
        }
        self.offset += filled as u64;
        Ok(())
    }
}

impl HttpRangeReader {
    /// Probe `url` with a default client and build a reader for it.
    pub async fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().build()?;
        Self::with_client(client, url).await
    }

    /// Probe `url` with the given client.
    ///
    /// Sends one plain GET and drops the response without reading its body.
    /// Fails unless the server advertises byte ranges, supplies an ETag and
    /// reports the content length.
    pub async fn with_client(client: Client, url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let resp = client.get(&url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RangeError::Status { status, url });
        }

        let accepts_bytes = header_str(resp.headers(), ACCEPT_RANGES)
            .is_some_and(|v| v.split(',').any(|unit| unit.trim().eq_ignore_ascii_case("bytes")));
        if !accepts_bytes {
            return Err(RangeError::RangesUnsupported);
        }

        let etag = header_str(resp.headers(), ETAG)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
            .ok_or(RangeError::MissingEtag)?;

        let content_length = resp.content_length().ok_or(RangeError::MissingLength)?;

        drop(resp);
        debug!(%url, content_length, %etag, "probed remote resource");

        Ok(Self {
            client,
            url,
            content_length,
            etag,
            stream: None,
            changed_etag: None,
            range_requests: 0,
            transferred_bytes: 0,
        })
    }

    /// Read exactly `buf.len()` bytes starting at `offset`.
    ///
    /// Reuses the open stream when it is already positioned at `offset`,
    /// otherwise replaces it with a new `Range: bytes=<offset>-` request.
    /// On failure the open stream is discarded; errors that happen while
    /// copying the body report the partial count through
    /// [`RangeError::bytes_read`].
    pub async fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if let Some(observed) = &self.changed_etag {
            return Err(RangeError::EtagChanged {
                expected: self.etag.clone(),
                observed: observed.clone(),
            });
        }

        if buf.is_empty() {
            return Ok(0);
        }

        let requested = buf.len();
        let fits = offset
            .checked_add(requested as u64)
            .is_some_and(|end| end <= self.content_length);
        if !fits {
            return Err(RangeError::ShortRead {
                offset,
                requested,
                read: 0,
            });
        }

        let mut stream = match self.stream.take() {
            Some(stream) if stream.offset == offset => {
                debug!(offset, len = requested, "reusing open range stream");
                stream
            }
            stale => {
                if let Some(stale) = stale {
                    debug!(from = stale.offset, to = offset, "abandoning range stream");
                }
                self.open_stream(offset).await?
            }
        };

        match stream.read_exact(buf).await {
            Ok(()) => {
                self.transferred_bytes += requested as u64;
                self.stream = Some(stream);
                Ok(requested)
            }
            Err(err) => {
                self.transferred_bytes += err.bytes_read() as u64;
                Err(err)
            }
        }
    }

    async fn open_stream(&mut self, offset: u64) -> Result<ActiveStream> {
        self.range_requests += 1;
        let response = self
            .client
            .get(&self.url)
            .header(RANGE, format!("bytes={offset}-"))
            .send()
            .await?;

        // Error statuses leave the reader usable; a retry opens a fresh stream.
        let status = response.status();
        if !status.is_success() {
            return Err(RangeError::Status {
                status,
                url: self.url.clone(),
            });
        }

        let observed = header_str(response.headers(), ETAG).map(str::to_owned);
        if observed.as_deref() != Some(self.etag.as_str()) {
            self.changed_etag = Some(observed.clone());
            return Err(RangeError::EtagChanged {
                expected: self.etag.clone(),
                observed,
            });
        }

        let usable = status == StatusCode::PARTIAL_CONTENT || (status == StatusCode::OK && offset == 0);
        if !usable {
            return Err(RangeError::Status {
                status,
                url: self.url.clone(),
            });
        }

        if status == StatusCode::PARTIAL_CONTENT {
            let content_range = header_str(response.headers(), CONTENT_RANGE);
            if content_range.and_then(content_range_start) != Some(offset) {
                return Err(RangeError::RangeMismatch {
                    offset,
                    content_range: content_range.map(str::to_owned),
                });
            }
        }

        debug!(offset, %status, "opened range stream");
        Ok(ActiveStream {
            response,
            pending: Bytes::new(),
            offset,
        })
    }

    /// Release the open stream, if any. Safe to call at any time.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!(offset = stream.offset, "closing range stream");
        }
    }

    /// Whether a range stream is currently held open.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Offset the open stream is positioned at.
    pub fn stream_position(&self) -> Option<u64> {
        self.stream.as_ref().map(|s| s.offset)
    }

    /// Total size of the resource as reported by the probe.
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    /// ETag captured by the probe.
    pub fn etag(&self) -> &str {
        &self.etag
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Number of range requests issued so far (the probe is not counted).
    pub fn range_requests(&self) -> u64 {
        self.range_requests
    }

    /// Body bytes delivered to callers so far.
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes
    }
}

#[async_trait]
impl ReadAt for HttpRangeReader {
    async fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> anyhow::Result<usize> {
        Ok(HttpRangeReader::read_at(self, offset, buf).await?)
    }

    fn size(&self) -> u64 {
        self.content_length
    }
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

/// Start offset of a `Content-Range: bytes <start>-<end>/<total>` value.
fn content_range_start(value: &str) -> Option<u64> {
    let (unit, range) = value.split_once(' ')?;
    if !unit.eq_ignore_ascii_case("bytes") {
        return None;
    }
    let (span, _total) = range.split_once('/')?;
    let (start, _end) = span.split_once('-')?;
    start.trim().parse().ok()
}
