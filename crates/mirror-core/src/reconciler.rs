//! One-way reconciliation of a replica tree against a source tree
//!
//! A pass runs in two phases:
//!
//! 1. **Creation/update** walks the source depth-first (pre-order) and makes
//!    sure every source directory exists in the replica and every source file
//!    has identical content there.
//! 2. **Deletion** walks the replica post-order and removes every entry that
//!    has no same-kind counterpart in the source, children before parents.
//!
//! The excluded path is never created, overwritten or removed. A directory
//! that only survives because it holds the excluded path is left in place,
//! even when the source has a file of the same name.
//!
//! Any I/O failure aborts the pass. Nothing applied earlier in the pass is
//! rolled back; the next pass re-diffs from scratch and converges.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use mirror_fs::path::is_within;
use mirror_fs::{EntryKind, LinkMode, TreeFs};
use tracing::{debug, warn};

use crate::compare::{ContentComparator, DigestComparator};
use crate::config::{SymlinkPolicy, SyncOptions};
use crate::event::{EventKind, EventSink, SyncEvent};
use crate::{Error, Result};

/// Outcome of a pass that ran to completion.
#[derive(Debug, Clone)]
pub struct PassReport {
    /// Applied operations, in application order
    pub events: Vec<SyncEvent>,
    /// Source files checked against the replica
    pub files_compared: usize,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl PassReport {
    /// True when the replica already matched the source.
    pub fn is_noop(&self) -> bool {
        self.events.is_empty()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }
}

/// Applies create/update/delete operations so a replica mirrors a source.
///
/// Generic over the storage backend, the event sink and the content
/// comparator so it runs against [`mirror_fs::LocalFs`] in production and
/// [`mirror_fs::MemoryFs`] in tests.
pub struct Reconciler<F, S, C = DigestComparator> {
    fs: F,
    sink: S,
    comparator: C,
    options: SyncOptions,
}

impl<F: TreeFs, S: EventSink> Reconciler<F, S> {
    /// Reconciler with digest comparison and default options.
    pub fn new(fs: F, sink: S) -> Self {
        Self {
            fs,
            sink,
            comparator: DigestComparator,
            options: SyncOptions::default(),
        }
    }
}

impl<F: TreeFs, S: EventSink, C: ContentComparator> Reconciler<F, S, C> {
    /// Swap the content comparator.
    pub fn with_comparator<C2: ContentComparator>(self, comparator: C2) -> Reconciler<F, S, C2> {
        Reconciler {
            fs: self.fs,
            sink: self.sink,
            comparator,
            options: self.options,
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Run one pass from `source_root` to `replica_root`, never touching
    /// `excluded`.
    ///
    /// Every applied operation reaches the sink as it happens, including the
    /// ones applied before a failure.
    ///
    /// # Errors
    ///
    /// - [`Error::SourceNotFound`] if the source is missing or not a directory
    /// - [`Error::ReplicaNotDirectory`] if the replica root is a file
    /// - [`Error::OverlappingRoots`] if one root contains the other
    /// - [`Error::Read`], [`Error::Write`] or [`Error::Delete`] for the first
    ///   I/O failure during the pass, tagged with the offending path
    pub fn sync(
        &mut self,
        source_root: &Path,
        replica_root: &Path,
        excluded: &Path,
    ) -> Result<PassReport> {
        let started_at = Utc::now();
        let timer = Instant::now();

        let source_root = self.fs.resolve(source_root).map_err(|source| Error::Resolve {
            path: source_root.to_path_buf(),
            source,
        })?;
        let replica_root = self.fs.resolve(replica_root).map_err(|source| Error::Resolve {
            path: replica_root.to_path_buf(),
            source,
        })?;
        let excluded = self.fs.resolve(excluded).map_err(|source| Error::Resolve {
            path: excluded.to_path_buf(),
            source,
        })?;

        match self.fs.entry_kind(&source_root, LinkMode::Follow) {
            Ok(Some(EntryKind::Directory)) => {}
            Ok(_) => return Err(Error::SourceNotFound { path: source_root }),
            Err(e) => {
                debug!(error = %e, "Source root is inaccessible");
                return Err(Error::SourceNotFound { path: source_root });
            }
        }

        if is_within(&replica_root, &source_root) || is_within(&source_root, &replica_root) {
            return Err(Error::OverlappingRoots {
                source_root,
                replica_root,
            });
        }

        let mut pass = Pass {
            fs: &self.fs,
            sink: &mut self.sink,
            comparator: &self.comparator,
            options: self.options,
            replica_root: replica_root.clone(),
            excluded,
            events: Vec::new(),
            files_compared: 0,
            source_ancestors: Vec::new(),
        };

        pass.prepare_replica_root(&replica_root)?;
        pass.mirror_dir(&source_root, &replica_root, false)?;
        pass.prune_dir(&replica_root, Some(&source_root))?;

        let report = PassReport {
            events: pass.events,
            files_compared: pass.files_compared,
            started_at,
            elapsed: timer.elapsed(),
        };
        debug!(
            source = %source_root.display(),
            replica = %replica_root.display(),
            events = report.events.len(),
            files_compared = report.files_compared,
            "Pass finished"
        );
        Ok(report)
    }
}

/// State of a single pass.
struct Pass<'a, F, S, C> {
    fs: &'a F,
    sink: &'a mut S,
    comparator: &'a C,
    options: SyncOptions,
    replica_root: PathBuf,
    excluded: PathBuf,
    events: Vec<SyncEvent>,
    files_compared: usize,
    /// Resolved source directories on the current descent, for cycle detection
    source_ancestors: Vec<PathBuf>,
}

impl<F: TreeFs, S: EventSink, C: ContentComparator> Pass<'_, F, S, C> {
    fn emit(&mut self, kind: EventKind, path: &Path) {
        let event = SyncEvent::new(kind, path);
        self.sink.record(&event);
        self.events.push(event);
    }

    fn prepare_replica_root(&mut self, replica_root: &Path) -> Result<()> {
        match self
            .fs
            .entry_kind(replica_root, LinkMode::Follow)
            .map_err(Error::read(replica_root))?
        {
            Some(EntryKind::Directory) => Ok(()),
            Some(_) => Err(Error::ReplicaNotDirectory {
                path: replica_root.to_path_buf(),
            }),
            None => {
                self.fs
                    .create_dir_all(replica_root)
                    .map_err(Error::write(replica_root))?;
                self.emit(EventKind::DirectoryCreated, replica_root);
                Ok(())
            }
        }
    }

    /// Kind of a source entry as the symlink policy sees it.
    fn source_kind(&self, path: &Path) -> Result<Option<EntryKind>> {
        let links = self.options.symlinks.source_links();
        let kind = self.fs.entry_kind(path, links).map_err(Error::read(path))?;
        Ok(kind.filter(|k| *k != EntryKind::Symlink))
    }

    /// Creation/update phase for one source directory.
    ///
    /// With `create` set the replica directory is made to exist first, but
    /// only once the source directory is known to be safe to descend into.
    fn mirror_dir(&mut self, source_dir: &Path, replica_dir: &Path, create: bool) -> Result<()> {
        let followed = match self.options.symlinks {
            SymlinkPolicy::Follow => match self.follow_target(source_dir)? {
                Some(resolved) => Some(resolved),
                None => return Ok(()),
            },
            SymlinkPolicy::Ignore => None,
        };

        if create {
            self.ensure_dir(replica_dir)?;
        }

        let tracked = followed.is_some();
        if let Some(resolved) = followed {
            self.source_ancestors.push(resolved);
        }
        let result = self.mirror_entries(source_dir, replica_dir);
        if tracked {
            self.source_ancestors.pop();
        }
        result
    }

    /// Resolved target of a source directory, or `None` if descending into
    /// it would loop back to an ancestor or lead into the replica.
    fn follow_target(&self, source_dir: &Path) -> Result<Option<PathBuf>> {
        let resolved = self.fs.resolve(source_dir).map_err(Error::read(source_dir))?;
        if self.source_ancestors.contains(&resolved) {
            warn!(
                path = %source_dir.display(),
                target = %resolved.display(),
                "Skipping symlinked directory that loops back to an ancestor"
            );
            return Ok(None);
        }
        if is_within(&resolved, &self.replica_root) {
            warn!(
                path = %source_dir.display(),
                target = %resolved.display(),
                "Skipping symlinked directory that points into the replica"
            );
            return Ok(None);
        }
        Ok(Some(resolved))
    }

    fn mirror_entries(&mut self, source_dir: &Path, replica_dir: &Path) -> Result<()> {
        let entries = self
            .fs
            .read_dir(source_dir, self.options.symlinks.source_links())
            .map_err(Error::read(source_dir))?;

        for entry in entries {
            let source_path = source_dir.join(&entry.name);
            let replica_path = replica_dir.join(&entry.name);

            if replica_path == self.excluded {
                debug!(path = %replica_path.display(), "Skipping excluded path");
                continue;
            }

            match entry.kind {
                EntryKind::Directory => self.mirror_dir(&source_path, &replica_path, true)?,
                EntryKind::File => self.mirror_file(&source_path, &replica_path)?,
                EntryKind::Symlink => {
                    debug!(path = %source_path.display(), "Ignoring source symlink");
                }
            }
        }
        Ok(())
    }

    fn ensure_dir(&mut self, replica_path: &Path) -> Result<()> {
        let existing = self
            .fs
            .entry_kind(replica_path, LinkMode::NoFollow)
            .map_err(Error::read(replica_path))?;

        match existing {
            Some(EntryKind::Directory) => return Ok(()),
            Some(EntryKind::File | EntryKind::Symlink) => {
                self.fs
                    .remove_file(replica_path)
                    .map_err(Error::delete(replica_path))?;
                self.emit(EventKind::FileRemoved, replica_path);
            }
            None => {}
        }

        self.fs
            .create_dir_all(replica_path)
            .map_err(Error::write(replica_path))?;
        self.emit(EventKind::DirectoryCreated, replica_path);
        Ok(())
    }

    fn mirror_file(&mut self, source_path: &Path, replica_path: &Path) -> Result<()> {
        self.files_compared += 1;

        let existing = self
            .fs
            .entry_kind(replica_path, LinkMode::NoFollow)
            .map_err(Error::read(replica_path))?;

        match existing {
            Some(EntryKind::File) => {
                if self
                    .comparator
                    .same_content(self.fs, source_path, replica_path)?
                {
                    return Ok(());
                }
            }
            Some(EntryKind::Directory) => {
                // A directory stands where the file goes; clear it first
                if self.prune_dir(replica_path, None)? {
                    warn!(
                        path = %replica_path.display(),
                        "Cannot replace directory holding the excluded path with a file, skipping"
                    );
                    return Ok(());
                }
                self.fs
                    .remove_dir(replica_path)
                    .map_err(Error::delete(replica_path))?;
                self.emit(EventKind::DirectoryRemoved, replica_path);
            }
            // The rename inside the copy replaces a link in place
            Some(EntryKind::Symlink) | None => {}
        }

        self.fs
            .copy_file(source_path, replica_path, self.options.metadata)
            .map_err(|e| {
                if e.path() == Some(source_path) {
                    Error::read(source_path)(e)
                } else {
                    Error::write(replica_path)(e)
                }
            })?;
        self.emit(EventKind::FileCopied, replica_path);
        Ok(())
    }

    /// Deletion phase for one replica directory.
    ///
    /// `source_dir` is the matching source directory, or `None` when the
    /// whole subtree is stale. Returns `true` if entries had to be kept
    /// (the excluded path or an ancestor of it), in which case the caller
    /// must not remove `replica_dir`.
    fn prune_dir(&mut self, replica_dir: &Path, source_dir: Option<&Path>) -> Result<bool> {
        let entries = self
            .fs
            .read_dir(replica_dir, LinkMode::NoFollow)
            .map_err(Error::read(replica_dir))?;

        let mut retained = false;
        for entry in entries {
            let replica_path = replica_dir.join(&entry.name);

            if replica_path == self.excluded {
                debug!(path = %replica_path.display(), "Keeping excluded path");
                retained = true;
                continue;
            }

            let source_path = source_dir.map(|dir| dir.join(&entry.name));
            let source_kind = match &source_path {
                Some(path) => self.source_kind(path)?,
                None => None,
            };

            match entry.kind {
                EntryKind::Directory => {
                    let counterpart = source_path
                        .as_deref()
                        .filter(|_| source_kind == Some(EntryKind::Directory));
                    let child_retained = self.prune_dir(&replica_path, counterpart)?;

                    if counterpart.is_some() {
                        continue;
                    }
                    if child_retained {
                        debug!(
                            path = %replica_path.display(),
                            "Keeping stale directory that still holds the excluded path"
                        );
                        retained = true;
                        continue;
                    }
                    self.fs
                        .remove_dir(&replica_path)
                        .map_err(Error::delete(&replica_path))?;
                    self.emit(EventKind::DirectoryRemoved, &replica_path);
                }
                EntryKind::File | EntryKind::Symlink => {
                    if source_kind == Some(entry.kind) {
                        continue;
                    }
                    self.fs
                        .remove_file(&replica_path)
                        .map_err(Error::delete(&replica_path))?;
                    self.emit(EventKind::FileRemoved, &replica_path);
                }
            }
        }
        Ok(retained)
    }
}
