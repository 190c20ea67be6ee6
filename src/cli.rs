use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rangezip")]
#[command(version)]
#[command(about = "Read files out of remote ZIP archives using HTTP Range requests", long_about = None)]
#[command(after_help = "Examples:\n  \
  rangezip list -v https://example.com/archive.zip      show archive contents\n  \
  rangezip extract https://example.com/a.zip '*.db'     extract matching entries\n  \
  rangezip extract -p snapshot.zip README | more        send an entry to a pipe\n  \
  rangezip bootstrap                                    fetch the configured target if missing")]
pub struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/rangezip/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Quiet mode, only errors are reported
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List archive contents
    List(ListArgs),
    /// Extract archive entries
    Extract(ExtractArgs),
    /// Fetch the configured target out of its snapshot archive if it is missing
    Bootstrap,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// ZIP file path or HTTP URL
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Show sizes, compression and timestamps (over HTTP, about one range
    /// request per entry)
    #[arg(short = 'v')]
    pub verbose: bool,
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// ZIP file path or HTTP URL
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Entries to extract by name, basename or glob (default: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<PathBuf>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n', conflicts_with = "overwrite")]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,
}

/// Whether `source` should be read over HTTP rather than from disk.
pub fn is_http_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
