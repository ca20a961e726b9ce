//! [`TreeFs`] backed by the real filesystem

use std::fs::{self, FileType};
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::checksum::{self, ContentDigest};
use crate::io::{self as fs_io, MetadataPolicy};
use crate::path::resolve_absolute;
use crate::tree::{DirEntry, EntryKind, LinkMode, TreeFs};
use crate::{Error, Result};

/// The local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

fn kind_of(file_type: FileType) -> Option<EntryKind> {
    if file_type.is_symlink() {
        Some(EntryKind::Symlink)
    } else if file_type.is_dir() {
        Some(EntryKind::Directory)
    } else if file_type.is_file() {
        Some(EntryKind::File)
    } else {
        // Sockets, fifos and devices are not mirrored
        None
    }
}

fn metadata(path: &Path, links: LinkMode) -> io::Result<fs::Metadata> {
    match links {
        LinkMode::Follow => fs::metadata(path),
        LinkMode::NoFollow => fs::symlink_metadata(path),
    }
}

impl TreeFs for LocalFs {
    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        resolve_absolute(path).map_err(|e| Error::io(path, e))
    }

    fn entry_kind(&self, path: &Path, links: LinkMode) -> Result<Option<EntryKind>> {
        match metadata(path, links) {
            Ok(meta) => Ok(kind_of(meta.file_type())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    fn read_dir(&self, path: &Path, links: LinkMode) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| Error::io(path, e))? {
            let entry = entry.map_err(|e| Error::io(path, e))?;
            let entry_path = entry.path();
            let file_type = entry.file_type().map_err(|e| Error::io(&entry_path, e))?;

            let kind = if links == LinkMode::Follow && file_type.is_symlink() {
                match fs::metadata(&entry_path) {
                    Ok(target) => kind_of(target.file_type()),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        warn!(path = %entry_path.display(), "Skipping dangling symlink");
                        None
                    }
                    Err(e) => return Err(Error::io(&entry_path, e)),
                }
            } else {
                kind_of(file_type)
            };

            if let Some(kind) = kind {
                entries.push(DirEntry::new(entry.file_name(), kind));
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn digest(&self, path: &Path) -> Result<ContentDigest> {
        checksum::file_digest(path).map_err(|e| Error::io(path, e))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs_io::create_dir_all(path)
    }

    fn copy_file(&self, from: &Path, to: &Path, metadata: MetadataPolicy) -> Result<()> {
        fs_io::copy_atomic(from, to, metadata).map(|_| ())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs_io::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> Result<()> {
        fs_io::remove_dir(path)
    }
}
