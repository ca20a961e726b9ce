//! Applied-operation events and the sinks that receive them
//!
//! The reconciler never logs events itself. It hands each [`SyncEvent`] to
//! the [`EventSink`] it was constructed with, in the order the operations
//! were applied.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

/// What a pass did to the replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    DirectoryCreated,
    FileCopied,
    FileRemoved,
    DirectoryRemoved,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectoryCreated => "Directory created",
            Self::FileCopied => "File copied",
            Self::FileRemoved => "File removed",
            Self::DirectoryRemoved => "Directory removed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One applied operation. `path` is the absolute replica path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SyncEvent {
    pub kind: EventKind,
    pub path: PathBuf,
}

impl SyncEvent {
    pub fn new(kind: EventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.path.display())
    }
}

/// Receiver of applied-operation notifications.
pub trait EventSink {
    fn record(&mut self, event: &SyncEvent);
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn record(&mut self, event: &SyncEvent) {
        (**self).record(event)
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn record(&mut self, event: &SyncEvent) {
        (**self).record(event)
    }
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F: FnMut(&SyncEvent)> EventSink for FnSink<F> {
    fn record(&mut self, event: &SyncEvent) {
        (self.0)(event)
    }
}

/// Collects every event it receives.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Vec<SyncEvent>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[SyncEvent] {
        &self.events
    }

    /// Hand back everything collected so far and start empty.
    pub fn take(&mut self) -> Vec<SyncEvent> {
        std::mem::take(&mut self.events)
    }
}

impl EventSink for MemorySink {
    fn record(&mut self, event: &SyncEvent) {
        self.events.push(event.clone());
    }
}

/// Emits each event as an `info` record on the `mirror::event` target.
///
/// Whatever subscriber the process installs decides where the line goes
/// (console, log file, both).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&mut self, event: &SyncEvent) {
        info!(
            target: "mirror::event",
            kind = ?event.kind,
            path = %event.path.display(),
            "{event}"
        );
    }
}

/// Records every event into two sinks, first `A` then `B`.
#[derive(Debug, Default, Clone)]
pub struct FanoutSink<A, B> {
    pub first: A,
    pub second: B,
}

impl<A, B> FanoutSink<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: EventSink, B: EventSink> EventSink for FanoutSink<A, B> {
    fn record(&mut self, event: &SyncEvent) {
        self.first.record(event);
        self.second.record(event);
    }
}
