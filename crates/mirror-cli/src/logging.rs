//! Tracing subscriber setup for the `mirror` binary
//!
//! Two layers share one filter: a console layer on stdout and a file layer
//! that appends plain text to the log file.

use std::fs::{File, OpenOptions};
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::error::{CliError, Result};

/// Level filter: `debug` when verbose, otherwise `RUST_LOG`, otherwise `info`.
pub fn filter(verbose: bool) -> Result<EnvFilter> {
    if verbose {
        return EnvFilter::try_new("debug").map_err(CliError::logging);
    }
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(CliError::logging)
}

/// Open the log file for appending, creating it and its parents.
pub fn open_log_file(path: &Path) -> Result<File> {
    if path.is_dir() {
        return Err(CliError::user(format!(
            "log file path is a directory: {}",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        mirror_fs::io::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Install the global subscriber. Can only succeed once per process.
pub fn init(log_file: &Path, verbose: bool) -> Result<()> {
    let file = open_log_file(log_file)?;

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(std::io::stdout().is_terminal())
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter(verbose)?)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(CliError::logging)
}
