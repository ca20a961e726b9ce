//! Multi-pass scenarios across the whole stack
//!
//! Each test drives several passes through the scheduler and checks how the
//! replica evolves, including recovery after failed passes.

use mirror_core::{Clock, Error, EventKind, MemorySink, Reconciler, Scheduler, SyncEvent};
use mirror_fs::{FaultOp, LocalFs, MemNode, MemoryFs};
use mirror_test_utils::TestTree;
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::cell::Cell;

/// Calls `hook` with the number of sleeps so far instead of sleeping.
struct HookClock<F: Fn(usize)> {
    hook: F,
    count: Cell<usize>,
}

impl<F: Fn(usize)> HookClock<F> {
    fn new(hook: F) -> Self {
        Self {
            hook,
            count: Cell::new(0),
        }
    }
}

impl<F: Fn(usize)> Clock for HookClock<F> {
    fn sleep(&self, _duration: Duration) {
        self.count.set(self.count.get() + 1);
        (self.hook)(self.count.get());
    }
}

fn contents(fs: &MemoryFs, root: &str) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
    fs.snapshot(root)
        .into_iter()
        .map(|(path, node)| match node {
            MemNode::File { content, .. } => (path, Some(content)),
            MemNode::Directory => (path, None),
        })
        .collect()
}

#[test]
fn scenarios_a_through_e_in_sequence() {
    let fs = MemoryFs::new()
        .with_dir("/src")
        .with_dir("/dst")
        .with_file("/dst/sync.log", "log\n");
    let log = Path::new("/dst/sync.log");

    let clock = HookClock::new(|n| match n {
        // A: a directory with one file appears
        1 => fs.write_file("/src/a/x.txt", "hi"),
        // B: nothing changes
        2 => {}
        // C: a stale replica subtree shows up
        3 => fs.write_file("/dst/b/y.txt", "stale"),
        // D: the source file changes
        4 => fs.write_file("/src/a/x.txt", "hello"),
        _ => {}
    });
    let scheduler = Scheduler::new(Duration::from_secs(1)).with_max_passes(Some(5));
    let mut reconciler = Reconciler::new(&fs, MemorySink::new());
    let mut per_pass: Vec<Vec<SyncEvent>> = Vec::new();

    scheduler
        .run(&clock, || {
            let report = reconciler.sync(Path::new("/src"), Path::new("/dst"), log)?;
            per_pass.push(report.events.clone());
            Ok(report)
        })
        .unwrap();

    let ev = |kind, path: &str| SyncEvent::new(kind, path);
    assert!(per_pass[0].is_empty());
    assert_eq!(
        per_pass[1],
        vec![
            ev(EventKind::DirectoryCreated, "/dst/a"),
            ev(EventKind::FileCopied, "/dst/a/x.txt"),
        ]
    );
    assert!(per_pass[2].is_empty());
    assert_eq!(
        per_pass[3],
        vec![
            ev(EventKind::FileRemoved, "/dst/b/y.txt"),
            ev(EventKind::DirectoryRemoved, "/dst/b"),
        ]
    );
    assert_eq!(per_pass[4], vec![ev(EventKind::FileCopied, "/dst/a/x.txt")]);

    // E: the log inside the replica was never touched
    assert_eq!(fs.file_content(log), Some(b"log\n".to_vec()));
    assert_eq!(fs.file_content("/dst/a/x.txt"), Some(b"hello".to_vec()));
}

#[test]
fn write_fault_fails_one_pass_and_the_next_converges() {
    let fs = MemoryFs::new()
        .with_file("/src/a.txt", "a")
        .with_file("/src/b/c.txt", "c")
        .with_dir("/dst");
    fs.fail_on("/dst/b/c.txt", FaultOp::Write);

    let clock = HookClock::new(|_| fs.clear_faults());
    let scheduler = Scheduler::new(Duration::from_secs(1)).with_max_passes(Some(2));
    let mut reconciler = Reconciler::new(&fs, MemorySink::new());
    let mut outcomes = Vec::new();

    let summary = scheduler
        .run(&clock, || {
            let result =
                reconciler.sync(Path::new("/src"), Path::new("/dst"), Path::new("/sync.log"));
            outcomes.push(match &result {
                Ok(report) => Ok(report.events.len()),
                Err(e) => Err(e.path().map(Path::to_path_buf)),
            });
            result
        })
        .unwrap();

    assert_eq!(summary.failed_passes, 1);
    assert_eq!(outcomes, vec![Err(Some(PathBuf::from("/dst/b/c.txt"))), Ok(1)]);
    // Events from the failed pass still reached the sink
    assert_eq!(
        reconciler
            .sink()
            .events()
            .iter()
            .map(|e| e.kind)
            .collect::<Vec<_>>(),
        vec![
            EventKind::FileCopied,
            EventKind::DirectoryCreated,
            EventKind::FileCopied,
        ]
    );
    assert_eq!(contents(&fs, "/dst"), contents(&fs, "/src"));
}

#[test]
fn fail_fast_stops_on_persistent_fault() {
    let fs = MemoryFs::new().with_file("/src/a.txt", "a").with_dir("/dst");
    fs.fail_on("/dst/a.txt", FaultOp::Write);

    let scheduler = Scheduler::new(Duration::from_secs(1))
        .with_max_passes(Some(5))
        .with_fail_fast(true);
    let clock = HookClock::new(|_| panic!("fail-fast must not wait for another pass"));
    let mut reconciler = Reconciler::new(&fs, MemorySink::new());

    let err = scheduler
        .run(&clock, || {
            reconciler.sync(Path::new("/src"), Path::new("/dst"), Path::new("/sync.log"))
        })
        .unwrap_err();

    assert!(matches!(err, Error::Write { .. }));
}

#[test]
fn leftover_temp_file_from_a_crash_is_cleaned_up() {
    let tree = TestTree::new();
    tree.source_file("data.bin", "complete");
    // What an interrupted copy leaves behind
    tree.replica_file(".data.bin.4242.tmp", "compl");

    let mut reconciler = Reconciler::new(LocalFs, MemorySink::new());
    let report = reconciler
        .sync(&tree.source(), &tree.replica(), tree.log_path())
        .unwrap();

    assert_eq!(report.count(EventKind::FileCopied), 1);
    assert_eq!(report.count(EventKind::FileRemoved), 1);
    tree.assert_mirrored();
}

#[test]
fn replica_recreated_after_being_deleted_between_passes() {
    let tree = TestTree::new();
    tree.source_file("a/b.txt", "b");
    let replica = tree.replica();

    let clock = HookClock::new(|_| std::fs::remove_dir_all(&replica).unwrap());
    let scheduler = Scheduler::new(Duration::from_secs(1)).with_max_passes(Some(2));
    let mut reconciler = Reconciler::new(LocalFs, MemorySink::new());

    let summary = scheduler
        .run(&clock, || {
            reconciler.sync(&tree.source(), &tree.replica(), tree.log_path())
        })
        .unwrap();

    assert_eq!(summary.failed_passes, 0);
    // Second pass: replica root, a, a/b.txt
    assert_eq!(summary.events, 2 + 3);
    tree.assert_mirrored();
}
