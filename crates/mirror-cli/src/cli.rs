//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::Parser;
use mirror_core::SymlinkPolicy;

/// Keep a replica directory identical to a source directory
///
/// Runs a synchronization pass, waits INTERVAL seconds and repeats. Every
/// applied operation is logged to the console and appended to LOG_FILE.
///
/// Examples:
///   mirror ./source ./replica 30 ./sync.log
///   mirror --config mirror.toml --once
///   mirror -c mirror.yaml ./other-source
#[derive(Parser, Debug)]
#[command(name = "mirror")]
#[command(author, version, about, long_about)]
pub struct Cli {
    /// Directory to mirror from
    pub source: Option<PathBuf>,

    /// Directory to mirror into
    pub replica: Option<PathBuf>,

    /// Seconds to wait between passes
    pub interval: Option<u64>,

    /// Log file; never touched by synchronization
    pub log_file: Option<PathBuf>,

    /// Load settings from a TOML, JSON or YAML file; arguments override it
    #[arg(short, long, value_name = "FILE", env = "MIRROR_CONFIG")]
    pub config: Option<PathBuf>,

    /// How source symlinks are treated (follow or ignore)
    #[arg(long, value_name = "POLICY")]
    pub symlinks: Option<SymlinkPolicy>,

    /// Give copies a fresh modification time
    #[arg(long)]
    pub no_preserve_mtime: bool,

    /// Give copies default permission bits
    #[arg(long)]
    pub no_preserve_permissions: bool,

    /// Run a single pass and exit
    #[arg(long, conflicts_with = "max_passes")]
    pub once: bool,

    /// Exit after this many passes
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_passes: Option<u64>,

    /// Exit with an error on the first failed pass
    #[arg(long)]
    pub fail_fast: bool,

    /// Enable debug output
    #[arg(short, long)]
    pub verbose: bool,
}
