//! Error types for ranged HTTP reads.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias for [`HttpRangeReader`](crate::HttpRangeReader) operations.
pub type Result<T> = core::result::Result<T, RangeError>;

/// Failures surfaced by [`HttpRangeReader`](crate::HttpRangeReader).
///
/// Nothing here is retried internally. `EtagChanged` is terminal for the
/// reader that produced it.
#[derive(Debug, Error)]
pub enum RangeError {
    /// The probe response did not advertise `Accept-Ranges: bytes`.
    #[error("remote server does not support range requests")]
    RangesUnsupported,

    /// The probe response carried no usable ETag.
    #[error("remote server did not provide an ETag, the resource cannot be read piecewise")]
    MissingEtag,

    /// The probe response did not report the resource length.
    #[error("remote server did not report a content length")]
    MissingLength,

    /// The server answered with a status this reader cannot use.
    #[error("unexpected HTTP status {status} for {url}")]
    Status { status: StatusCode, url: String },

    /// A partial response covered a range other than the one requested.
    #[error("range response for offset {offset} covered {}", .content_range.as_deref().unwrap_or("<no Content-Range>"))]
    RangeMismatch {
        offset: u64,
        content_range: Option<String>,
    },

    /// The resource changed between requests.
    #[error("ETag changed between requests: expected {expected}, got {}", .observed.as_deref().unwrap_or("<none>"))]
    EtagChanged {
        expected: String,
        observed: Option<String>,
    },

    /// The body ended before the requested number of bytes arrived.
    #[error("short read at offset {offset}: requested {requested} bytes, got {read}")]
    ShortRead {
        offset: u64,
        requested: usize,
        read: usize,
    },

    /// Sending a request failed.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The body stream failed part way through a read.
    #[error("HTTP body read failed after {read} bytes: {source}")]
    Body {
        read: usize,
        #[source]
        source: reqwest::Error,
    },
}

impl RangeError {
    /// Bytes copied into the caller's buffer before the failure.
    pub fn bytes_read(&self) -> usize {
        match self {
            RangeError::ShortRead { read, .. } | RangeError::Body { read, .. } => *read,
            _ => 0,
        }
    }

    /// Whether the error means the resource can no longer be trusted.
    pub fn is_consistency_violation(&self) -> bool {
        matches!(self, RangeError::EtagChanged { .. })
    }
}
