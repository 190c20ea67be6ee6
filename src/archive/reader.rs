use std::io::{self, Read, Seek, Write};

use anyhow::{Context, Result};
use tokio::runtime::Handle;
use zip::ZipArchive;

use super::entry::{ArchiveEntry, basename};
use crate::io::{ReadAt, SeekableReader};

/// Size of the end of central directory record without its comment.
const END_RECORD_LEN: u64 = 22;
const END_RECORD_SIGNATURE: [u8; 4] = *b"PK\x05\x06";
/// Tail fetched up front; covers the end record of most archives.
const INITIAL_TAIL: u64 = 4096;
/// Largest possible end record, with a maximum length comment.
const MAX_TAIL: u64 = END_RECORD_LEN + u16::MAX as u64;

/// ZIP archive reader over any seekable source.
pub struct ArchiveReader<R: Read + Seek> {
    archive: ZipArchive<R>,
}

impl<R: Read + Seek> ArchiveReader<R> {
    /// Read the central directory from `reader`.
    pub fn new(reader: R) -> Result<Self> {
        let archive = ZipArchive::new(reader).context("failed to read ZIP central directory")?;
        Ok(Self { archive })
    }

    /// Number of entries in the central directory.
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    /// Names of all entries, sorted, answered from the central directory
    /// alone.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.archive.file_names().map(str::to_owned).collect();
        names.sort_unstable();
        names
    }

    /// Metadata for every entry, in central directory order.
    ///
    /// Opening an entry makes the `zip` crate resolve its local header, so
    /// this touches every header in the archive. Prefer [`names`](Self::names)
    /// when only names are needed.
    pub fn entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        (0..self.archive.len())
            .map(|index| {
                let file = self
                    .archive
                    .by_index(index)
                    .with_context(|| format!("failed to read entry #{index}"))?;
                Ok(ArchiveEntry::from_zip(index, &file))
            })
            .collect()
    }

    /// Full name of the entry whose last path component is `name`.
    ///
    /// Answered from the central directory alone. When several entries share
    /// the basename, the lexicographically smallest full name wins.
    pub fn find_by_basename(&self, name: &str) -> Option<String> {
        self.archive
            .file_names()
            .filter(|candidate| !candidate.ends_with('/') && basename(candidate) == name)
            .min()
            .map(str::to_owned)
    }

    /// Stream the decompressed contents of entry `name` into `writer`.
    pub fn extract_to<W: Write + ?Sized>(&mut self, name: &str, writer: &mut W) -> Result<u64> {
        let mut file = self
            .archive
            .by_name(name)
            .with_context(|| format!("failed to open entry {name}"))?;
        let copied =
            io::copy(&mut file, writer).with_context(|| format!("failed to extract {name}"))?;
        Ok(copied)
    }

    pub fn into_inner(self) -> R {
        self.archive.into_inner()
    }
}

/// Open `reader` as a ZIP archive on a blocking thread and run `f` against it.
///
/// The end of the source is fetched up front so the backward search for the
/// end record and a central directory near the end stay in memory.
///
/// Returns the closure's value together with the source, so callers can
/// inspect transfer statistics and release it explicitly. Must be called from
/// within a tokio runtime.
pub async fn with_archive<R, T, F>(reader: R, f: F) -> Result<(T, R)>
where
    R: ReadAt + 'static,
    T: Send + 'static,
    F: FnOnce(&mut ArchiveReader<SeekableReader<R>>) -> Result<T> + Send + 'static,
{
    let handle = Handle::current();
    tokio::task::spawn_blocking(move || {
        let mut source = SeekableReader::new(reader, handle);
        preload_tail(&mut source).context("failed to read archive tail")?;
        let mut archive = ArchiveReader::new(source)?;
        let value = f(&mut archive)?;
        Ok((value, archive.into_inner().into_inner()))
    })
    .await
    .context("archive task panicked")?
}

/// Cache the archive tail, growing to the largest possible end record only
/// when the first window does not hold one.
fn preload_tail<R: ReadAt>(source: &mut SeekableReader<R>) -> io::Result<()> {
    let tail = source.cache_tail(INITIAL_TAIL)?;
    if !has_end_record(tail) {
        source.cache_tail(MAX_TAIL)?;
    }
    Ok(())
}

/// Whether `tail` (the last bytes of an archive) holds an end record whose
/// comment runs exactly to the end.
fn has_end_record(tail: &[u8]) -> bool {
    let fixed = END_RECORD_LEN as usize;
    if tail.len() < fixed {
        return false;
    }
    (0..=tail.len() - fixed).rev().any(|pos| {
        let record = &tail[pos..pos + fixed];
        let comment_len = u16::from_le_bytes([record[20], record[21]]) as usize;
        record[..4] == END_RECORD_SIGNATURE && pos + fixed + comment_len == tail.len()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use zip::write::FileOptions;

    fn sample_zip() -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let stored = FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let deflated = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        writer.add_directory("snapshot/", stored).unwrap();
        writer.start_file("snapshot/consensus.db", deflated).unwrap();
        writer.write_all(&[7u8; 4096]).unwrap();
        writer.start_file("README", stored).unwrap();
        writer.write_all(b"bootstrap snapshot").unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn lists_entries_in_directory_order() {
        let mut archive = ArchiveReader::new(Cursor::new(sample_zip())).unwrap();
        let entries = archive.entries().unwrap();

        let names: Vec<_> = entries.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, ["snapshot/", "snapshot/consensus.db", "README"]);
        assert!(entries[0].is_directory);
        assert_eq!(entries[1].uncompressed_size, 4096);
        assert!(entries[1].compressed_size < 4096);
        assert_eq!(entries[2].basename(), "README");
    }

    #[test]
    fn finds_and_extracts_by_basename() {
        let mut archive = ArchiveReader::new(Cursor::new(sample_zip())).unwrap();
        let name = archive.find_by_basename("consensus.db").unwrap();
        assert_eq!(name, "snapshot/consensus.db");
        assert!(archive.find_by_basename("snapshot").is_none());
        assert!(archive.find_by_basename("missing.db").is_none());

        let mut out = Vec::new();
        let n = archive.extract_to(&name, &mut out).unwrap();
        assert_eq!(n, 4096);
        assert!(out.iter().all(|&b| b == 7));
    }

    #[test]
    fn names_come_sorted_from_the_central_directory() {
        let archive = ArchiveReader::new(Cursor::new(sample_zip())).unwrap();
        assert_eq!(
            archive.names(),
            ["README", "snapshot/", "snapshot/consensus.db"]
        );
    }

    #[test]
    fn end_record_detection() {
        let mut plain = sample_zip();
        assert!(has_end_record(&plain));
        assert!(has_end_record(&plain[plain.len() - 22..]));
        assert!(!has_end_record(&plain[plain.len() - 21..]));

        // A tail cut off inside the comment has no usable end record.
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer.set_comment("c".repeat(300));
        writer.start_file("a", FileOptions::default()).unwrap();
        let commented = writer.finish().unwrap().into_inner();
        assert!(has_end_record(&commented));
        assert!(!has_end_record(&commented[commented.len() - 200..]));

        plain.extend_from_slice(b"trailing");
        assert!(!has_end_record(&plain));
    }

    #[test]
    fn rejects_non_zip_input() {
        let err = ArchiveReader::new(Cursor::new(b"not a zip file".to_vec())).err().unwrap();
        assert!(err.to_string().contains("central directory"));
    }
}
