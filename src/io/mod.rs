mod blocking;
mod http;
mod local;

pub use blocking::SeekableReader;
pub use http::HttpRangeReader;
pub use local::LocalFileReader;

use anyhow::Result;
use async_trait::async_trait;

/// Trait for random access reading from a data source
///
/// Implementations fill the whole buffer or fail; a short count is never a
/// successful result.
#[async_trait]
pub trait ReadAt: Send {
    /// Read exactly `buf.len()` bytes starting at `offset`
    async fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;
}
