//! # rangezip
//!
//! Random-access reads over HTTP Range requests, used to pull individual files
//! out of large remote ZIP archives without downloading them in full.
//!
//! [`HttpRangeReader`] probes a URL once for its length and ETag, then serves
//! `read_at` calls from a single open-ended range response. Sequential reads
//! share that response; a jump to another offset replaces it. Every response
//! must carry the ETag seen by the probe, so bytes from two different versions
//! of the resource are never mixed.
//!
//! ## Features
//!
//! - Exact-length random access reads over HTTP with stream reuse
//! - ETag pinning across requests
//! - Blocking `Read + Seek` adapter for synchronous archive readers
//! - ZIP listing and extraction (stored and deflate) from URLs or local files
//! - Config-driven bootstrap of a missing file from a remote snapshot
//!
//! ## Example
//!
//! ```no_run
//! use rangezip::HttpRangeReader;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut reader = HttpRangeReader::new("https://example.com/archive.zip").await?;
//!
//!     // End of Central Directory record, no archive comment
//!     let mut eocd = [0u8; 22];
//!     reader.read_at(reader.content_length() - 22, &mut eocd).await?;
//!     assert_eq!(&eocd[..4], b"PK\x05\x06");
//!
//!     reader.close();
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod logging;
pub mod select;

pub use archive::{ArchiveEntry, ArchiveReader};
pub use cli::Cli;
pub use error::{RangeError, Result};
pub use io::{HttpRangeReader, LocalFileReader, ReadAt, SeekableReader};
