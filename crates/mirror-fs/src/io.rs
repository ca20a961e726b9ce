//! Atomic I/O operations with file locking

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Which source metadata is carried over to a copied file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataPolicy {
    /// Copy the source modification time onto the replica file.
    pub preserve_mtime: bool,
    /// Copy the source permission bits onto the replica file.
    pub preserve_permissions: bool,
}

impl Default for MetadataPolicy {
    fn default() -> Self {
        Self {
            preserve_mtime: true,
            preserve_permissions: true,
        }
    }
}

impl MetadataPolicy {
    /// Copy content only.
    pub fn content_only() -> Self {
        Self {
            preserve_mtime: false,
            preserve_permissions: false,
        }
    }
}

/// Write `content` to `path` atomically, creating parent directories.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    replace_via_temp(path, |temp_file, temp_path| {
        temp_file
            .write_all(content)
            .map_err(|e| Error::io(temp_path, e))
    })
}

/// Copy `from` to `to` atomically, returning the number of bytes written.
///
/// Streams into a locked sibling temp file, applies metadata per `policy`,
/// flushes and renames over `to`. The temp file is removed on any failure so
/// a half-written file is never visible at the final path. Failures opening
/// the source are reported against `from`.
pub fn copy_atomic(from: &Path, to: &Path, policy: MetadataPolicy) -> Result<u64> {
    let mut source = File::open(from).map_err(|e| Error::io(from, e))?;
    let source_meta = source.metadata().map_err(|e| Error::io(from, e))?;
    if source_meta.is_dir() {
        return Err(Error::IsADirectory {
            path: from.to_path_buf(),
        });
    }

    let mut written = 0;
    replace_via_temp(to, |temp_file, temp_path| {
        written = io::copy(&mut source, temp_file).map_err(|e| Error::io(temp_path, e))?;

        if policy.preserve_mtime {
            let modified = source_meta.modified().map_err(|e| Error::io(from, e))?;
            temp_file
                .set_modified(modified)
                .map_err(|e| Error::io(temp_path, e))?;
        }
        if policy.preserve_permissions {
            temp_file
                .set_permissions(source_meta.permissions())
                .map_err(|e| Error::io(temp_path, e))?;
        }
        Ok(())
    })?;

    Ok(written)
}

/// Fill a locked temp file next to `target` with `fill`, sync it and rename
/// it over `target`. The temp file never outlives a failure.
fn replace_via_temp<W>(target: &Path, fill: W) -> Result<()>
where
    W: FnOnce(&mut File, &Path) -> Result<()>,
{
    let temp_path = temp_path_for(target);
    let result = fill_temp(&temp_path, target, fill)
        .and_then(|()| fs::rename(&temp_path, target).map_err(|e| Error::io(target, e)));
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn fill_temp<W>(temp_path: &Path, target: &Path, fill: W) -> Result<()>
where
    W: FnOnce(&mut File, &Path) -> Result<()>,
{
    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(temp_path)
        .map_err(|e| Error::io(temp_path, e))?;

    // Exclusive lock, released when the handle drops
    FileExt::lock_exclusive(&temp_file).map_err(|_| Error::LockFailed {
        path: target.to_path_buf(),
    })?;

    fill(&mut temp_file, temp_path)?;

    temp_file.sync_all().map_err(|e| Error::io(temp_path, e))
}

/// Temp file path in the same directory as `path` (same filesystem, so the
/// final rename is atomic).
pub fn temp_path_for(path: &Path) -> PathBuf {
    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    path.with_file_name(temp_name)
}

/// Read text content from a file.
pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

/// Create a directory and any missing ancestors.
pub fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| Error::io(path, e))
}

/// Remove a single file (or symlink).
pub fn remove_file(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(|e| Error::io(path, e))
}

/// Remove an empty directory.
pub fn remove_dir(path: &Path) -> Result<()> {
    fs::remove_dir(path).map_err(|e| Error::io(path, e))
}
