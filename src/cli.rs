//! Command-line surface for the uploader

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments
#[derive(Clone, Debug, Parser)]
#[command(
    author,
    version,
    about = "Upload directory trees to an HTTP endpoint, one PUT per file",
    override_usage = "blitup [OPTIONS] URL PATH..."
)]
pub struct Args {
    /// Destination URL followed by one or more local paths. A `[uuid]` in
    /// the URL is replaced with a random UUID.
    #[arg(value_name = "URL PATH")]
    pub targets: Vec<String>,

    /// Number of simultaneous uploads
    #[arg(short = 'k', value_name = "N")]
    pub concurrency: Option<usize>,

    /// Include hidden files and directories
    #[arg(short = 'a', long = "all")]
    pub all: bool,

    /// Print uploaded files
    #[arg(short, long)]
    pub verbose: bool,

    /// No output
    #[arg(short, long)]
    pub quiet: bool,

    /// Skip files already on the server with the same size
    #[arg(short, long)]
    pub sync: bool,

    /// Exit with status 2 if any file failed or any directory was unreadable
    #[arg(long)]
    pub strict: bool,

    /// Attempts per file
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Seconds to wait between attempts
    #[arg(long = "retry-delay", value_name = "SECS")]
    pub retry_delay: Option<u64>,

    /// Per-request timeout in seconds (default: none)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Upload directory contents directly under URL instead of URL/<dirname>/
    #[arg(long)]
    pub flat: bool,

    /// TOML file with default options
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Append a timestamped event log to this file
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Print each path's summary as a JSON line
    #[arg(long)]
    pub json: bool,
}

impl Args {
    pub fn url(&self) -> Option<&str> {
        self.targets.first().map(String::as_str)
    }

    pub fn paths(&self) -> &[String] {
        self.targets.get(1..).unwrap_or(&[])
    }
}
