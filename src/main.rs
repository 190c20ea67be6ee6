//! Main entry point for the rangezip CLI application.
//!
//! Lists and extracts ZIP archives from local paths or HTTP URLs, and runs
//! the config-driven snapshot bootstrap.

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use std::io::{Read, Seek, Write};
use std::path::Path;

use rangezip::archive::{savings_percent, with_archive};
use rangezip::bootstrap::{self, Outcome};
use rangezip::cli::{Command, ExtractArgs, is_http_url};
use rangezip::config::{self, AppConfig};
use rangezip::select::{self, Selection};
use rangezip::{ArchiveReader, Cli, HttpRangeReader, LocalFileReader, ReadAt, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.quiet);

    let cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Command::List(args) => {
            let source = Source::open(&args.source, &cfg).await?;
            let verbose = args.verbose;
            let ((), source) = with_archive(source, move |archive| list_files(archive, verbose)).await?;
            report(source, cli.quiet);
        }
        Command::Extract(args) => {
            let source = Source::open(&args.source, &cfg).await?;
            let quiet = cli.quiet;
            let ((), source) =
                with_archive(source, move |archive| extract_files(archive, &args, quiet)).await?;
            report(source, cli.quiet);
        }
        Command::Bootstrap => {
            let client = cfg.http.build_client()?;
            match bootstrap::run(&cfg.bootstrap, client).await? {
                Outcome::NotConfigured => {
                    tracing::info!("bootstrap target or source not configured, nothing to do");
                }
                Outcome::AlreadyPresent(_) => {}
                Outcome::Installed {
                    range_requests,
                    transferred_bytes,
                    ..
                } => {
                    if !cli.quiet {
                        eprintln!(
                            "Range requests: {}, bytes transferred: {}",
                            range_requests,
                            format_size(transferred_bytes)
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

/// Where archive bytes come from.
enum Source {
    Http(HttpRangeReader),
    Local(LocalFileReader),
}

impl Source {
    async fn open(location: &str, cfg: &AppConfig) -> Result<Self> {
        if is_http_url(location) {
            let client = cfg.http.build_client()?;
            Ok(Source::Http(
                HttpRangeReader::with_client(client, location).await?,
            ))
        } else {
            Ok(Source::Local(LocalFileReader::new(Path::new(location))?))
        }
    }
}

#[async_trait]
impl ReadAt for Source {
    async fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        match self {
            Source::Http(reader) => ReadAt::read_at(reader, offset, buf).await,
            Source::Local(reader) => reader.read_at(offset, buf).await,
        }
    }

    fn size(&self) -> u64 {
        match self {
            Source::Http(reader) => reader.size(),
            Source::Local(reader) => reader.size(),
        }
    }
}

/// Release the source and print network statistics for HTTP sources.
///
/// # Arguments
///
/// * `source` - The source the archive was read from, returned by `with_archive`
/// * `quiet` - If true, release the source without printing anything
fn report(source: Source, quiet: bool) {
    if let Source::Http(mut reader) = source {
        reader.close();
        if !quiet {
            eprintln!(
                "\nRange requests: {}, bytes transferred: {}",
                reader.range_requests(),
                format_size(reader.transferred_bytes())
            );
        }
    }
}

/// Print entry names, or an `unzip -v` style table with totals.
///
/// Names alone come from the central directory. The table needs each
/// entry's metadata, which the `zip` crate resolves through the local
/// header, so over HTTP it costs about one range request per entry.
///
/// # Arguments
///
/// * `archive` - The opened archive
/// * `verbose` - If true, display sizes, compression and timestamps in a table
///
/// # Returns
///
/// Returns `Ok(())` on success, or an error if listing fails.
fn list_files<R: Read + Seek>(archive: &mut ArchiveReader<R>, verbose: bool) -> Result<()> {
    let mut out = std::io::stdout().lock();

    if !verbose {
        for name in archive.names() {
            writeln!(out, "{}", name)?;
        }
        return Ok(());
    }

    let entries = archive.entries()?;

    writeln!(
        out,
        "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
        "Length", "Size", "Cmpr", "Date", "Time"
    )?;
    writeln!(out, "{}", "-".repeat(70))?;

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in &entries {
        let (year, month, day) = entry.mod_date;
        let (hour, minute, _) = entry.mod_time;
        writeln!(
            out,
            "{:>10}  {:>10}  {:>4}%  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            entry.savings_percent(),
            year,
            month,
            day,
            hour,
            minute,
            entry.file_name
        )?;

        if !entry.is_directory {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    writeln!(out, "{}", "-".repeat(70))?;
    writeln!(
        out,
        "{:>10}  {:>10}  {:>4}%  {:>21}  {} files",
        total_uncompressed,
        total_compressed,
        savings_percent(total_compressed, total_uncompressed),
        "",
        file_count
    )?;

    Ok(())
}

/// Extract the entries selected by `args`.
///
/// Selection runs on names from the central directory, so only the chosen
/// entries are opened.
///
/// # Arguments
///
/// * `archive` - The opened archive
/// * `args` - Entry selection, destination and overwrite policy
/// * `quiet` - If true, suppress progress and skip messages
///
/// # Returns
///
/// Returns `Ok(())` on success, or an error if any selected entry fails to
/// extract.
fn extract_files<R: Read + Seek>(
    archive: &mut ArchiveReader<R>,
    args: &ExtractArgs,
    quiet: bool,
) -> Result<()> {
    let selection = Selection::new(args.files.clone(), args.exclude.clone());
    let selected: Vec<String> = archive
        .names()
        .into_iter()
        .filter(|name| selection.matches(name))
        .collect();

    if args.pipe {
        let mut stdout = std::io::stdout().lock();
        let show_names = selected.len() > 1;
        for name in &selected {
            if show_names {
                writeln!(stdout, "--- {} ---", name)?;
            }
            archive.extract_to(name, &mut stdout)?;
        }
        stdout.flush()?;
        return Ok(());
    }

    for name in &selected {
        let path = select::output_path(name, args.extract_dir.as_deref(), args.junk_paths)?;

        if path.exists() {
            if args.never_overwrite {
                if !quiet {
                    eprintln!("Skipping: {} (file exists)", name);
                }
                continue;
            }
            if !args.overwrite {
                if !quiet {
                    eprintln!("Skipping: {} (use -o to overwrite)", name);
                }
                continue;
            }
        }

        if !quiet {
            println!("  extracting: {}", name);
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(&path)?;
        archive.extract_to(name, &mut file)?;
    }

    Ok(())
}

/// Format a byte size into a human-readable string.
///
/// # Arguments
///
/// * `size` - The size in bytes to format
///
/// # Returns
///
/// A formatted string with the size and appropriate unit.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    match size {
        s if s >= GB => format!("{:.2} GB", s as f64 / GB as f64),
        s if s >= MB => format!("{:.2} MB", s as f64 / MB as f64),
        s if s >= KB => format!("{:.2} KB", s as f64 / KB as f64),
        s => format!("{s} bytes"),
    }
}
