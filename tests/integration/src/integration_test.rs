//! End-to-end integration test for the mirror loop
//!
//! This test exercises the complete flow: config loading -> scheduler ->
//! reconciler -> on-disk replica, with a clock that edits the source tree
//! between passes instead of sleeping.

use mirror_core::{
    Clock, EventKind, FanoutSink, FnSink, MemorySink, MirrorConfig, Reconciler, Scheduler,
    SyncEvent,
};
use mirror_fs::LocalFs;
use mirror_test_utils::TestTree;
use pretty_assertions::assert_eq;
use std::cell::{Cell, RefCell};
use std::fs;
use std::time::Duration;

/// Runs one source edit per sleep, in order.
struct EditingClock<'a> {
    edits: Vec<Box<dyn Fn() + 'a>>,
    next: Cell<usize>,
    slept: RefCell<Vec<Duration>>,
}

impl<'a> EditingClock<'a> {
    fn new(edits: Vec<Box<dyn Fn() + 'a>>) -> Self {
        Self {
            edits,
            next: Cell::new(0),
            slept: RefCell::new(Vec::new()),
        }
    }
}

impl Clock for EditingClock<'_> {
    fn sleep(&self, duration: Duration) {
        self.slept.borrow_mut().push(duration);
        if let Some(edit) = self.edits.get(self.next.get()) {
            edit();
        }
        self.next.set(self.next.get() + 1);
    }
}

fn write_config(tree: &TestTree, max_passes: u64) -> std::path::PathBuf {
    let path = tree.root().join("mirror.json");
    let config = serde_json::json!({
        "source": tree.source(),
        "replica": tree.replica(),
        "interval_secs": 30,
        "log_file": tree.log_path(),
        "max_passes": max_passes,
        "metadata": { "preserve_permissions": false },
    });
    fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
}

#[test]
fn config_driven_loop_tracks_source_changes() {
    let tree = TestTree::with_log_in_replica("mirror.log");
    tree.write_log("previous run\n");
    tree.source_file("docs/readme.md", "v1");
    tree.source_file("data/a.bin", [1u8, 2, 3]);

    let config = MirrorConfig::load(&write_config(&tree, 4)).unwrap();
    config.validate().unwrap();
    assert!(!config.metadata.preserve_permissions);
    assert!(config.metadata.preserve_mtime);

    let clock = EditingClock::new(vec![
        // Before pass 2: edit a file
        Box::new(|| {
            tree.source_file("docs/readme.md", "v2");
        }),
        // Before pass 3: drop a directory and add a nested one
        Box::new(|| {
            fs::remove_dir_all(tree.source().join("data")).unwrap();
            tree.source_file("new/deep/file.txt", "n");
        }),
        // Before pass 4: nothing changes
    ]);

    let scheduler = Scheduler::from_config(&config);
    let mut per_pass: Vec<Vec<SyncEvent>> = Vec::new();
    let mut reconciler = Reconciler::new(LocalFs, MemorySink::new())
        .with_options(config.sync_options());

    let summary = scheduler
        .run(&clock, || {
            let report = reconciler.sync(&config.source, &config.replica, &config.log_file)?;
            per_pass.push(report.events.clone());
            Ok(report)
        })
        .unwrap();

    assert_eq!(summary.passes, 4);
    assert_eq!(summary.failed_passes, 0);
    assert_eq!(clock.slept.borrow().as_slice(), &[Duration::from_secs(30); 3]);

    let kinds = |events: &[SyncEvent]| events.iter().map(|e| e.kind).collect::<Vec<_>>();
    assert_eq!(
        kinds(&per_pass[0]),
        vec![
            EventKind::DirectoryCreated,
            EventKind::FileCopied,
            EventKind::DirectoryCreated,
            EventKind::FileCopied,
        ]
    );
    assert_eq!(kinds(&per_pass[1]), vec![EventKind::FileCopied]);
    assert_eq!(
        kinds(&per_pass[2]),
        vec![
            EventKind::DirectoryCreated,
            EventKind::DirectoryCreated,
            EventKind::FileCopied,
            EventKind::FileRemoved,
            EventKind::DirectoryRemoved,
        ]
    );
    assert!(per_pass[3].is_empty());

    assert_eq!(summary.events, reconciler.sink().events().len());
    assert_eq!(tree.read_replica("docs/readme.md"), "v2");
    assert_eq!(tree.read_replica("mirror.log"), "previous run\n");
    tree.assert_mirrored_except(&["mirror.log"]);
}

#[test]
fn events_fan_out_to_every_sink_in_order() {
    let tree = TestTree::new();
    tree.source_file("a/b/c.txt", "c");
    tree.replica_file("z/old.txt", "old");

    let mut rendered = Vec::new();
    let sink = FanoutSink::new(
        MemorySink::new(),
        FnSink(|event: &SyncEvent| rendered.push(event.to_string())),
    );
    let mut reconciler = Reconciler::new(LocalFs, sink);

    let report = reconciler
        .sync(&tree.source(), &tree.replica(), tree.log_path())
        .unwrap();
    let collected = reconciler.into_sink().first.take();

    assert_eq!(collected, report.events);
    let prefixes: Vec<_> = rendered
        .iter()
        .map(|line| line.split(':').next().unwrap().to_string())
        .collect();
    assert_eq!(
        prefixes,
        vec![
            "Directory created",
            "Directory created",
            "File copied",
            "File removed",
            "Directory removed",
        ]
    );
}

#[test]
fn failing_pass_does_not_stop_the_loop() {
    let tree = TestTree::new();
    tree.source_file("f.txt", "f");
    let source = tree.source();
    let moved = tree.root().join("moved-away");

    let clock = EditingClock::new(vec![
        // Source disappears before pass 2 and comes back before pass 3
        Box::new(|| fs::rename(&source, &moved).unwrap()),
        Box::new(|| fs::rename(&moved, &source).unwrap()),
    ]);
    let scheduler = Scheduler::new(Duration::from_secs(1)).with_max_passes(Some(3));
    let mut reconciler = Reconciler::new(LocalFs, MemorySink::new());

    let summary = scheduler
        .run(&clock, || {
            reconciler.sync(&tree.source(), &tree.replica(), tree.log_path())
        })
        .unwrap();

    assert_eq!(summary.passes, 3);
    assert_eq!(summary.failed_passes, 1);
    // The failed pass touched nothing
    tree.assert_mirrored();
}
