//! Content equality between a source file and its replica

use std::path::Path;

use mirror_fs::{EntryKind, LinkMode, TreeFs};
use tracing::trace;

use crate::{Error, Result};

/// Decides whether a replica file already holds the source file's content.
pub trait ContentComparator {
    /// `Ok(false)` means the replica must be rewritten.
    fn same_content(&self, fs: &dyn TreeFs, source: &Path, replica: &Path) -> Result<bool>;
}

/// Compares full-content SHA-256 digests. Size and timestamps are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct DigestComparator;

impl ContentComparator for DigestComparator {
    fn same_content(&self, fs: &dyn TreeFs, source: &Path, replica: &Path) -> Result<bool> {
        // Missing replica differs without hashing anything
        let replica_kind = fs
            .entry_kind(replica, LinkMode::NoFollow)
            .map_err(Error::read(replica))?;
        if replica_kind != Some(EntryKind::File) {
            return Ok(false);
        }

        let source_digest = fs.digest(source).map_err(Error::read(source))?;
        let replica_digest = fs.digest(replica).map_err(Error::read(replica))?;
        trace!(
            source = %source.display(),
            %source_digest,
            %replica_digest,
            "Compared digests"
        );
        Ok(source_digest == replica_digest)
    }
}
