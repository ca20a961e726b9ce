//! Filesystem layer for dir-mirror
//!
//! Provides the [`TreeFs`] abstraction the reconciler walks, its local and
//! in-memory backends, SHA-256 content digests and atomic file copies.

pub mod checksum;
pub mod config;
pub mod error;
pub mod io;
pub mod local;
pub mod memory;
pub mod path;
pub mod tree;

pub use checksum::ContentDigest;
pub use config::ConfigStore;
pub use error::{Error, Result};
pub use io::MetadataPolicy;
pub use local::LocalFs;
pub use memory::{FaultOp, MemNode, MemoryFs};
pub use path::resolve_absolute;
pub use tree::{DirEntry, EntryKind, LinkMode, TreeFs};
