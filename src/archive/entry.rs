use std::path::Path;

use zip::read::ZipFile;

/// Metadata for one member of a ZIP archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Position in the central directory
    pub index: usize,
    /// Name as stored in the archive
    pub file_name: String,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub is_directory: bool,
    /// DOS modification date as (year, month, day)
    pub mod_date: (u16, u8, u8),
    /// DOS modification time as (hour, minute, second)
    pub mod_time: (u8, u8, u8),
}

impl ArchiveEntry {
    pub(crate) fn from_zip(index: usize, file: &ZipFile<'_>) -> Self {
        let modified = file.last_modified();
        Self {
            index,
            file_name: file.name().to_string(),
            compressed_size: file.compressed_size(),
            uncompressed_size: file.size(),
            is_directory: file.is_dir(),
            mod_date: (modified.year(), modified.month(), modified.day()),
            mod_time: (modified.hour(), modified.minute(), modified.second()),
        }
    }

    /// Final path component of the entry name.
    pub fn basename(&self) -> &str {
        basename(&self.file_name)
    }

    /// Percentage of space saved by compression, 0 for empty entries.
    pub fn savings_percent(&self) -> u64 {
        savings_percent(self.compressed_size, self.uncompressed_size)
    }
}

pub(crate) fn basename(name: &str) -> &str {
    let trimmed = name.trim_end_matches('/');
    Path::new(trimmed)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(trimmed)
}

/// Compression savings for a pair of sizes, as shown by `unzip -v`.
pub fn savings_percent(compressed: u64, uncompressed: u64) -> u64 {
    if uncompressed == 0 {
        return 0;
    }
    100u64.saturating_sub(compressed.saturating_mul(100) / uncompressed)
}
