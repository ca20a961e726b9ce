//! Absolute path resolution for tree roots and the excluded path
//!
//! Roots and the excluded path must compare equal no matter how they were
//! spelled on the command line, so every path is made absolute and the part
//! that exists on disk is canonicalised before any comparison.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Resolve `path` to an absolute form suitable for equality checks.
///
/// The deepest existing ancestor is canonicalised (following symlinks, without
/// UNC prefixes on Windows) and the non-existent remainder is appended after
/// lexical normalisation. Works for paths that do not exist yet, such as a
/// replica root or a log file before the first pass.
pub fn resolve_absolute(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let absolute = normalize_lexically(&absolute);

    let mut existing = absolute.as_path();
    let mut remainder = Vec::new();
    loop {
        match dunce::canonicalize(existing) {
            Ok(canonical) => {
                let mut resolved = canonical;
                for part in remainder.iter().rev() {
                    resolved.push(part);
                }
                return Ok(resolved);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let Some(name) = existing.file_name() else {
                    return Ok(absolute);
                };
                remainder.push(name.to_os_string());
                existing = match existing.parent() {
                    Some(parent) => parent,
                    None => return Ok(absolute),
                };
            }
            Err(e) => return Err(e),
        }
    }
}

/// Remove `.` components and fold `..` into the preceding component without
/// touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `/..` is `/`
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}

/// Whether `path` equals `base` or lies beneath it.
pub fn is_within(path: &Path, base: &Path) -> bool {
    path.starts_with(base)
}
