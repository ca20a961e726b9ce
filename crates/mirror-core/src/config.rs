//! Mirror configuration
//!
//! A [`MirrorConfig`] can be loaded from a TOML, JSON or YAML file and then
//! overridden field by field from the command line.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use mirror_fs::{ConfigStore, LinkMode, MetadataPolicy};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How symbolic links found in the source tree are treated.
///
/// Replica links are never followed under either policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymlinkPolicy {
    /// Treat links as the OS does: a link to a file is mirrored as a regular
    /// file, a link to a directory is traversed.
    #[default]
    Follow,
    /// Pretend source links do not exist.
    Ignore,
}

impl SymlinkPolicy {
    /// Link mode used when listing the source tree.
    pub fn source_links(&self) -> LinkMode {
        match self {
            Self::Follow => LinkMode::Follow,
            Self::Ignore => LinkMode::NoFollow,
        }
    }
}

impl FromStr for SymlinkPolicy {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "follow" => Ok(Self::Follow),
            "ignore" | "skip" => Ok(Self::Ignore),
            _ => Err(Error::invalid_config(format!(
                "unknown symlink policy '{s}' (expected 'follow' or 'ignore')"
            ))),
        }
    }
}

impl fmt::Display for SymlinkPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Follow => write!(f, "follow"),
            Self::Ignore => write!(f, "ignore"),
        }
    }
}

/// Per-pass behaviour of the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncOptions {
    pub symlinks: SymlinkPolicy,
    pub metadata: MetadataPolicy,
}

/// Everything the driver needs to run the mirror loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MirrorConfig {
    /// Directory to mirror from
    pub source: PathBuf,
    /// Directory to mirror into
    pub replica: PathBuf,
    /// Seconds to wait between the end of one pass and the start of the next
    pub interval_secs: u64,
    /// Log file; never touched by a pass
    pub log_file: PathBuf,
    pub symlinks: SymlinkPolicy,
    /// Stop the loop on the first failed pass instead of logging and waiting
    pub fail_fast: bool,
    /// Stop after this many passes; run forever when unset
    pub max_passes: Option<u64>,
    pub metadata: MetadataPolicy,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            replica: PathBuf::new(),
            interval_secs: 60,
            log_file: PathBuf::new(),
            symlinks: SymlinkPolicy::default(),
            metadata: MetadataPolicy::default(),
            fail_fast: false,
            max_passes: None,
        }
    }
}

impl MirrorConfig {
    /// Load from a config file; format follows the extension.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(ConfigStore::new().load(path)?)
    }

    /// Write to a config file in the format its extension names.
    pub fn save(&self, path: &Path) -> Result<()> {
        Ok(ConfigStore::new().save(path, self)?)
    }

    /// Reject configurations the loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.source.as_os_str().is_empty() {
            return Err(Error::invalid_config("source path is required"));
        }
        if self.replica.as_os_str().is_empty() {
            return Err(Error::invalid_config("replica path is required"));
        }
        if self.log_file.as_os_str().is_empty() {
            return Err(Error::invalid_config("log file path is required"));
        }
        if self.interval_secs == 0 {
            return Err(Error::invalid_config("interval must be at least 1 second"));
        }
        if self.max_passes == Some(0) {
            return Err(Error::invalid_config("max_passes must be at least 1"));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            symlinks: self.symlinks,
            metadata: self.metadata,
        }
    }
}
