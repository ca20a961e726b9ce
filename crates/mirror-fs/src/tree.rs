//! Storage-agnostic directory tree access
//!
//! The reconciler only ever talks to a [`TreeFs`], so it runs unchanged
//! against the real filesystem ([`LocalFs`](crate::LocalFs)) or the in-memory
//! fake ([`MemoryFs`](crate::MemoryFs)).

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::checksum::ContentDigest;
use crate::io::MetadataPolicy;
use crate::Result;

/// Kind of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
    /// Only reported when links are not followed.
    Symlink,
}

/// Whether symbolic links are resolved when inspecting an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkMode {
    /// Report the kind of the link target.
    #[default]
    Follow,
    /// Report links as [`EntryKind::Symlink`].
    NoFollow,
}

/// One child of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: OsString,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn new(name: impl Into<OsString>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Directory-entry enumerator and mutation surface used by a sync pass.
///
/// All paths passed in are absolute. Implementations return listings sorted
/// by name so that passes are deterministic.
pub trait TreeFs {
    /// Resolve a path to the absolute form used for equality checks.
    fn resolve(&self, path: &Path) -> Result<PathBuf>;

    /// Kind of the entry at `path`, or `None` when nothing is there.
    fn entry_kind(&self, path: &Path, links: LinkMode) -> Result<Option<EntryKind>>;

    /// Children of the directory at `path`, sorted by name.
    fn read_dir(&self, path: &Path, links: LinkMode) -> Result<Vec<DirEntry>>;

    /// Digest of the full content of the file at `path`.
    fn digest(&self, path: &Path) -> Result<ContentDigest>;

    /// Create `path` and any missing ancestors.
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Replace `to` with the content of `from`, never exposing a partial file.
    fn copy_file(&self, from: &Path, to: &Path, metadata: MetadataPolicy) -> Result<()>;

    /// Remove a file or symlink.
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Remove an empty directory.
    fn remove_dir(&self, path: &Path) -> Result<()>;
}

impl<T: TreeFs + ?Sized> TreeFs for &T {
    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        (**self).resolve(path)
    }

    fn entry_kind(&self, path: &Path, links: LinkMode) -> Result<Option<EntryKind>> {
        (**self).entry_kind(path, links)
    }

    fn read_dir(&self, path: &Path, links: LinkMode) -> Result<Vec<DirEntry>> {
        (**self).read_dir(path, links)
    }

    fn digest(&self, path: &Path) -> Result<ContentDigest> {
        (**self).digest(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        (**self).create_dir_all(path)
    }

    fn copy_file(&self, from: &Path, to: &Path, metadata: MetadataPolicy) -> Result<()> {
        (**self).copy_file(from, to, metadata)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        (**self).remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> Result<()> {
        (**self).remove_dir(path)
    }
}
