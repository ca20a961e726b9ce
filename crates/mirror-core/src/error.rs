//! Error types for mirror-core

use std::path::{Path, PathBuf};

/// Result type for mirror-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or running a sync pass
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Source root missing, inaccessible or not a directory
    #[error("Source directory not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// Replica root exists but is not a directory
    #[error("Replica root is not a directory: {path}")]
    ReplicaNotDirectory { path: PathBuf },

    /// One root lies inside the other
    #[error("Source {source_root} and replica {replica_root} overlap")]
    OverlappingRoots {
        source_root: PathBuf,
        replica_root: PathBuf,
    },

    /// A root or the excluded path could not be made absolute
    #[error("Failed to resolve {path}: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: mirror_fs::Error,
    },

    /// Reading a directory listing or file content failed
    #[error("Read failed at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: mirror_fs::Error,
    },

    /// Creating a directory or copying a file into the replica failed
    #[error("Write failed at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: mirror_fs::Error,
    },

    /// Removing a replica entry failed
    #[error("Delete failed at {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: mirror_fs::Error,
    },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Filesystem error from mirror-fs
    #[error(transparent)]
    Fs(#[from] mirror_fs::Error),
}

impl Error {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub(crate) fn read(path: &Path) -> impl FnOnce(mirror_fs::Error) -> Self + '_ {
        move |source| Self::Read {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn write(path: &Path) -> impl FnOnce(mirror_fs::Error) -> Self + '_ {
        move |source| Self::Write {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn delete(path: &Path) -> impl FnOnce(mirror_fs::Error) -> Self + '_ {
        move |source| Self::Delete {
            path: path.to_path_buf(),
            source,
        }
    }

    /// The path this error is about, when it has one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::SourceNotFound { path }
            | Self::ReplicaNotDirectory { path }
            | Self::Resolve { path, .. }
            | Self::Read { path, .. }
            | Self::Write { path, .. }
            | Self::Delete { path, .. } => Some(path),
            Self::OverlappingRoots { replica_root, .. } => Some(replica_root),
            Self::InvalidConfig { .. } | Self::Fs(_) => None,
        }
    }
}
