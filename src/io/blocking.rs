//! Blocking `Read + Seek` view over a [`ReadAt`] source.
//!
//! Archive readers such as the `zip` crate want a synchronous seekable
//! stream and issue many tiny reads. [`SeekableReader`] keeps a cursor and
//! drives `read_at` on a tokio runtime handle, so it must be used from a
//! thread that is not itself running async tasks (e.g. inside
//! `tokio::task::spawn_blocking`).
//!
//! Two in-memory windows keep small reads off the source: a tail cache
//! filled on request with [`SeekableReader::cache_tail`], and a short
//! read-ahead taken whenever a read asks for fewer than [`READ_AHEAD`] bytes.

use std::io::{self, Read, Seek, SeekFrom};

use tokio::runtime::Handle;

use super::ReadAt;

/// Reads shorter than this are widened to it and the surplus kept.
pub const READ_AHEAD: usize = 512;

/// A run of source bytes held in memory.
#[derive(Debug, Default)]
struct Window {
    start: u64,
    data: Vec<u8>,
}

impl Window {
    fn end(&self) -> u64 {
        self.start + self.data.len() as u64
    }

    /// Copy what this window holds at `position` into `buf`.
    fn copy_to(&self, position: u64, buf: &mut [u8]) -> Option<usize> {
        if position < self.start || position >= self.end() {
            return None;
        }
        let from = (position - self.start) as usize;
        let n = buf.len().min(self.data.len() - from);
        buf[..n].copy_from_slice(&self.data[from..from + n]);
        Some(n)
    }
}

pub struct SeekableReader<R: ReadAt> {
    inner: R,
    handle: Handle,
    position: u64,
    size: u64,
    /// Always ends at `size`; empty until `cache_tail` is called.
    tail: Window,
    ahead: Window,
}

impl<R: ReadAt> SeekableReader<R> {
    pub fn new(inner: R, handle: Handle) -> Self {
        let size = inner.size();
        Self {
            inner,
            handle,
            position: 0,
            size,
            tail: Window {
                start: size,
                data: Vec::new(),
            },
            ahead: Window::default(),
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Keep the last `len` bytes of the source in memory and return them.
    ///
    /// Only the part not cached yet is fetched, in a single read. Later reads
    /// that land in the tail never reach the source.
    pub fn cache_tail(&mut self, len: u64) -> io::Result<&[u8]> {
        let start = self.size.saturating_sub(len);
        if start < self.tail.start {
            let missing = usize::try_from(self.tail.start - start)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "tail window too large"))?;
            let mut data = vec![0u8; missing];
            self.fetch(start, &mut data)?;
            data.extend_from_slice(&self.tail.data);
            self.tail = Window { start, data };
        }
        Ok(&self.tail.data)
    }

    fn fetch(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.handle
            .block_on(self.inner.read_at(offset, buf))
            .map(|_| ())
            .map_err(|err| io::Error::other(Box::<dyn std::error::Error + Send + Sync>::from(err)))
    }

    /// Read from the source at the cursor, stopping where the tail begins.
    fn read_through(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let limit = self.tail.start.saturating_sub(self.position);
        let want = usize::try_from(limit).map_or(buf.len(), |l| l.min(buf.len()));
        if want >= READ_AHEAD {
            self.fetch(self.position, &mut buf[..want])?;
            return Ok(want);
        }

        let span = usize::try_from(limit).map_or(READ_AHEAD, |l| l.min(READ_AHEAD));
        let mut data = vec![0u8; span];
        self.fetch(self.position, &mut data)?;
        buf[..want].copy_from_slice(&data[..want]);
        self.ahead = Window {
            start: self.position,
            data,
        };
        Ok(want)
    }
}

impl<R: ReadAt> Read for SeekableReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.size.saturating_sub(self.position);
        let len = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
        if len == 0 {
            return Ok(0);
        }
        let buf = &mut buf[..len];

        let read = match self.tail.copy_to(self.position, buf) {
            Some(n) => n,
            None => match self.ahead.copy_to(self.position, buf) {
                Some(n) => n,
                None => self.read_through(buf)?,
            },
        };
        self.position += read as u64;
        Ok(read)
    }
}

impl<R: ReadAt> Seek for SeekableReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.size.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )
        })?;
        self.position = target;
        Ok(target)
    }
}
