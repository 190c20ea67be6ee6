//! ZIP archive access on top of random-access sources.
//!
//! Parsing is delegated to the `zip` crate, which reads the End of Central
//! Directory from the tail of the source, then the Central Directory, and
//! only touches an entry's local header and data when that entry is opened.
//! Over HTTP this means the tail costs one or two range requests and each
//! opened entry about one more, instead of downloading the whole archive.
//!
//! The `zip` crate is synchronous, so [`with_archive`] runs the caller's work
//! on a blocking thread through a [`SeekableReader`](crate::io::SeekableReader).

mod entry;
mod reader;

pub(crate) use entry::basename;
pub use entry::{ArchiveEntry, savings_percent};
pub use reader::{ArchiveReader, with_archive};
