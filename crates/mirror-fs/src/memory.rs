//! In-memory [`TreeFs`] with fault injection
//!
//! Keeps a flat map of absolute paths to nodes. There are no symlinks, so
//! [`LinkMode`] has no effect. Faults registered with [`MemoryFs::fail_on`]
//! make the matching operation on that exact path return
//! [`Error::Injected`].

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::checksum::ContentDigest;
use crate::io::MetadataPolicy;
use crate::path::normalize_lexically;
use crate::tree::{DirEntry, EntryKind, LinkMode, TreeFs};
use crate::{Error, Result};

/// Operation class a fault can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultOp {
    /// Listing a directory or reading file content.
    Read,
    /// Creating a directory or writing a file.
    Write,
    /// Removing a file or directory.
    Remove,
}

/// A node stored in [`MemoryFs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemNode {
    Directory,
    File {
        content: Vec<u8>,
        /// Logical modification stamp, bumped on every write.
        modified: u64,
    },
}

/// In-memory filesystem fake.
#[derive(Debug)]
pub struct MemoryFs {
    nodes: Mutex<BTreeMap<PathBuf, MemNode>>,
    faults: Mutex<Vec<(PathBuf, FaultOp)>>,
    clock: AtomicU64,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_empty(path: &Path) -> Error {
    Error::io(
        path,
        io::Error::new(io::ErrorKind::DirectoryNotEmpty, "directory not empty"),
    )
}

impl MemoryFs {
    /// An empty filesystem containing only `/`.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(PathBuf::from("/"), MemNode::Directory);
        Self {
            nodes: Mutex::new(nodes),
            faults: Mutex::new(Vec::new()),
            clock: AtomicU64::new(1),
        }
    }

    /// Builder form of [`MemoryFs::create_dir`].
    pub fn with_dir(self, path: impl AsRef<Path>) -> Self {
        self.create_dir(path);
        self
    }

    /// Builder form of [`MemoryFs::write_file`].
    pub fn with_file(self, path: impl AsRef<Path>, content: impl AsRef<[u8]>) -> Self {
        self.write_file(path, content);
        self
    }

    /// Create a directory and its ancestors, replacing files in the way.
    pub fn create_dir(&self, path: impl AsRef<Path>) {
        let path = normalize_lexically(path.as_ref());
        let mut nodes = lock(&self.nodes);
        for ancestor in path.ancestors() {
            nodes.insert(ancestor.to_path_buf(), MemNode::Directory);
        }
    }

    /// Write a file, creating parent directories as needed.
    pub fn write_file(&self, path: impl AsRef<Path>, content: impl AsRef<[u8]>) {
        let path = normalize_lexically(path.as_ref());
        if let Some(parent) = path.parent() {
            self.create_dir(parent);
        }
        let modified = self.tick();
        lock(&self.nodes).insert(
            path,
            MemNode::File {
                content: content.as_ref().to_vec(),
                modified,
            },
        );
    }

    /// Remove a node and everything beneath it.
    pub fn remove_tree(&self, path: impl AsRef<Path>) {
        let path = normalize_lexically(path.as_ref());
        lock(&self.nodes).retain(|k, _| !k.starts_with(&path));
    }

    /// Content of the file at `path`, if it is a file.
    pub fn file_content(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match lock(&self.nodes).get(&normalize_lexically(path.as_ref())) {
            Some(MemNode::File { content, .. }) => Some(content.clone()),
            _ => None,
        }
    }

    /// Logical modification stamp of the file at `path`.
    pub fn modified(&self, path: impl AsRef<Path>) -> Option<u64> {
        match lock(&self.nodes).get(&normalize_lexically(path.as_ref())) {
            Some(MemNode::File { modified, .. }) => Some(*modified),
            _ => None,
        }
    }

    /// Every node at or beneath `root`, keyed by its path relative to `root`.
    pub fn snapshot(&self, root: impl AsRef<Path>) -> BTreeMap<PathBuf, MemNode> {
        let root = normalize_lexically(root.as_ref());
        lock(&self.nodes)
            .iter()
            .filter_map(|(path, node)| {
                let rel = path.strip_prefix(&root).ok()?;
                (!rel.as_os_str().is_empty()).then(|| (rel.to_path_buf(), node.clone()))
            })
            .collect()
    }

    /// Make `op` on exactly `path` fail until faults are cleared.
    pub fn fail_on(&self, path: impl AsRef<Path>, op: FaultOp) {
        lock(&self.faults).push((normalize_lexically(path.as_ref()), op));
    }

    pub fn clear_faults(&self) {
        lock(&self.faults).clear();
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn check_fault(&self, path: &Path, op: FaultOp) -> Result<()> {
        let injected = lock(&self.faults)
            .iter()
            .any(|(p, o)| p == path && *o == op);
        if injected {
            return Err(Error::Injected {
                path: path.to_path_buf(),
                op,
            });
        }
        Ok(())
    }
}

impl TreeFs for MemoryFs {
    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        Ok(normalize_lexically(&Path::new("/").join(path)))
    }

    fn entry_kind(&self, path: &Path, _links: LinkMode) -> Result<Option<EntryKind>> {
        Ok(lock(&self.nodes).get(path).map(|node| match node {
            MemNode::Directory => EntryKind::Directory,
            MemNode::File { .. } => EntryKind::File,
        }))
    }

    fn read_dir(&self, path: &Path, _links: LinkMode) -> Result<Vec<DirEntry>> {
        self.check_fault(path, FaultOp::Read)?;
        let nodes = lock(&self.nodes);
        match nodes.get(path) {
            Some(MemNode::Directory) => {}
            Some(MemNode::File { .. }) => {
                return Err(Error::NotADirectory {
                    path: path.to_path_buf(),
                });
            }
            None => {
                return Err(Error::NotFound {
                    path: path.to_path_buf(),
                });
            }
        }

        // BTreeMap order keeps the listing sorted by name
        Ok(nodes
            .iter()
            .filter(|(child, _)| child.parent() == Some(path) && child.as_path() != path)
            .filter_map(|(child, node)| {
                let kind = match node {
                    MemNode::Directory => EntryKind::Directory,
                    MemNode::File { .. } => EntryKind::File,
                };
                child.file_name().map(|name| DirEntry::new(name, kind))
            })
            .collect())
    }

    fn digest(&self, path: &Path) -> Result<ContentDigest> {
        self.check_fault(path, FaultOp::Read)?;
        match lock(&self.nodes).get(path) {
            Some(MemNode::File { content, .. }) => Ok(ContentDigest::of_bytes(content)),
            Some(MemNode::Directory) => Err(Error::IsADirectory {
                path: path.to_path_buf(),
            }),
            None => Err(Error::NotFound {
                path: path.to_path_buf(),
            }),
        }
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.check_fault(path, FaultOp::Write)?;
        let mut nodes = lock(&self.nodes);
        let mut missing = Vec::new();
        for ancestor in path.ancestors() {
            match nodes.get(ancestor) {
                Some(MemNode::Directory) => break,
                Some(MemNode::File { .. }) => {
                    return Err(Error::NotADirectory {
                        path: ancestor.to_path_buf(),
                    });
                }
                None => missing.push(ancestor.to_path_buf()),
            }
        }
        for dir in missing {
            nodes.insert(dir, MemNode::Directory);
        }
        Ok(())
    }

    fn copy_file(&self, from: &Path, to: &Path, metadata: MetadataPolicy) -> Result<()> {
        self.check_fault(from, FaultOp::Read)?;
        self.check_fault(to, FaultOp::Write)?;
        let stamp = self.tick();
        let mut nodes = lock(&self.nodes);

        let (content, source_modified) = match nodes.get(from) {
            Some(MemNode::File { content, modified }) => (content.clone(), *modified),
            Some(MemNode::Directory) => {
                return Err(Error::IsADirectory {
                    path: from.to_path_buf(),
                });
            }
            None => {
                return Err(Error::NotFound {
                    path: from.to_path_buf(),
                });
            }
        };

        let parent_is_dir = to
            .parent()
            .is_some_and(|parent| matches!(nodes.get(parent), Some(MemNode::Directory)));
        if !parent_is_dir {
            return Err(Error::NotFound {
                path: to.to_path_buf(),
            });
        }
        if let Some(MemNode::Directory) = nodes.get(to) {
            return Err(Error::IsADirectory {
                path: to.to_path_buf(),
            });
        }

        let modified = if metadata.preserve_mtime {
            source_modified
        } else {
            stamp
        };
        nodes.insert(to.to_path_buf(), MemNode::File { content, modified });
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.check_fault(path, FaultOp::Remove)?;
        let mut nodes = lock(&self.nodes);
        match nodes.get(path) {
            Some(MemNode::File { .. }) => {
                nodes.remove(path);
                Ok(())
            }
            Some(MemNode::Directory) => Err(Error::IsADirectory {
                path: path.to_path_buf(),
            }),
            None => Err(Error::NotFound {
                path: path.to_path_buf(),
            }),
        }
    }

    fn remove_dir(&self, path: &Path) -> Result<()> {
        self.check_fault(path, FaultOp::Remove)?;
        let mut nodes = lock(&self.nodes);
        match nodes.get(path) {
            Some(MemNode::Directory) => {
                let has_children = nodes.keys().any(|k| k.parent() == Some(path) && k != path);
                if has_children {
                    return Err(not_empty(path));
                }
                nodes.remove(path);
                Ok(())
            }
            Some(MemNode::File { .. }) => Err(Error::NotADirectory {
                path: path.to_path_buf(),
            }),
            None => Err(Error::NotFound {
                path: path.to_path_buf(),
            }),
        }
    }
}
