//! Reconciliation engine for dir-mirror
//!
//! Keeps a replica directory tree byte-identical to a source tree:
//!
//! - **Reconciler**: one pass of create/update/delete over a [`TreeFs`]
//! - **Content comparator**: SHA-256 digest equality
//! - **Event sinks**: ordered notification of every applied operation
//! - **Scheduler**: runs passes on a fixed interval with an injectable clock
//!
//! # Architecture
//!
//! ```text
//!                 mirror-cli
//!                     |
//!                mirror-core
//!       (reconciler, scheduler, config)
//!                     |
//!                 mirror-fs
//!     (TreeFs, LocalFs, MemoryFs, digests)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use mirror_core::{MemorySink, Reconciler};
//! use mirror_fs::LocalFs;
//!
//! let mut reconciler = Reconciler::new(LocalFs, MemorySink::new());
//! let report = reconciler
//!     .sync(Path::new("source"), Path::new("replica"), Path::new("sync.log"))
//!     .unwrap();
//! println!("{} operations applied", report.events.len());
//! ```
//!
//! [`TreeFs`]: mirror_fs::TreeFs

pub mod compare;
pub mod config;
pub mod error;
pub mod event;
pub mod reconciler;
pub mod schedule;

pub use compare::{ContentComparator, DigestComparator};
pub use config::{MirrorConfig, SymlinkPolicy, SyncOptions};
pub use error::{Error, Result};
pub use event::{EventKind, EventSink, FanoutSink, FnSink, MemorySink, SyncEvent, TracingSink};
pub use reconciler::{PassReport, Reconciler};
pub use schedule::{Clock, RunSummary, Scheduler, StopHandle, SystemClock};
