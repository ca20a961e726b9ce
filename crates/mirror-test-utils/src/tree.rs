//! [`TestTree`] fixture for mirror scenarios.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A node as seen by [`snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Dir,
    File(Vec<u8>),
    Symlink(PathBuf),
}

/// Every entry beneath `root`, keyed by its `/`-separated relative path.
///
/// Symlinks are recorded as links and never followed. Panics if `root`
/// cannot be read, which is what a test wants.
pub fn snapshot(root: &Path) -> BTreeMap<String, Node> {
    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<String, Node>) {
    for entry in fs::read_dir(dir).expect("snapshot: failed to read directory") {
        let entry = entry.expect("snapshot: failed to read entry");
        let path = entry.path();
        let rel = path
            .strip_prefix(root)
            .expect("snapshot: entry outside root")
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let file_type = entry.file_type().expect("snapshot: failed to stat entry");

        if file_type.is_symlink() {
            let target = fs::read_link(&path).expect("snapshot: failed to read link");
            out.insert(rel, Node::Symlink(target));
        } else if file_type.is_dir() {
            out.insert(rel, Node::Dir);
            walk(root, &path, out);
        } else {
            let content = fs::read(&path).expect("snapshot: failed to read file");
            out.insert(rel, Node::File(content));
        }
    }
}

/// A temporary directory holding `source/`, `replica/` and a log path.
///
/// # Example
///
/// ```rust,no_run
/// use mirror_test_utils::TestTree;
///
/// let tree = TestTree::new();
/// tree.source_file("a/x.txt", "hi");
/// // ... run a pass ...
/// tree.assert_mirrored();
/// ```
pub struct TestTree {
    temp_dir: TempDir,
    log_path: PathBuf,
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTree {
    /// Empty source and replica directories; the log sits beside them.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("TestTree::new: failed to create temp dir");
        fs::create_dir(temp_dir.path().join("source")).expect("TestTree::new: source");
        fs::create_dir(temp_dir.path().join("replica")).expect("TestTree::new: replica");
        let log_path = temp_dir.path().join("sync.log");
        Self { temp_dir, log_path }
    }

    /// Like [`TestTree::new`] but the log lives inside the replica root.
    pub fn with_log_in_replica(name: &str) -> Self {
        let mut tree = Self::new();
        tree.log_path = tree.replica().join(name);
        tree
    }

    /// Use an arbitrary log location relative to the fixture root.
    pub fn with_log_at(mut self, rel: &str) -> Self {
        self.log_path = self.root().join(rel);
        self
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn source(&self) -> PathBuf {
        self.root().join("source")
    }

    pub fn replica(&self) -> PathBuf {
        self.root().join("replica")
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Write a source file, creating parents.
    pub fn source_file(&self, rel: &str, content: impl AsRef<[u8]>) -> PathBuf {
        write_file(&self.source().join(rel), content.as_ref())
    }

    /// Create a source directory and its parents.
    pub fn source_dir(&self, rel: &str) -> PathBuf {
        let path = self.source().join(rel);
        fs::create_dir_all(&path).expect("TestTree::source_dir: failed to create directory");
        path
    }

    /// Write a replica file, creating parents.
    pub fn replica_file(&self, rel: &str, content: impl AsRef<[u8]>) -> PathBuf {
        write_file(&self.replica().join(rel), content.as_ref())
    }

    /// Create a replica directory and its parents.
    pub fn replica_dir(&self, rel: &str) -> PathBuf {
        let path = self.replica().join(rel);
        fs::create_dir_all(&path).expect("TestTree::replica_dir: failed to create directory");
        path
    }

    /// Write the log file, creating parents.
    pub fn write_log(&self, content: impl AsRef<[u8]>) {
        write_file(&self.log_path, content.as_ref());
    }

    pub fn read_replica(&self, rel: &str) -> String {
        fs::read_to_string(self.replica().join(rel))
            .unwrap_or_else(|e| panic!("TestTree::read_replica: {rel}: {e}"))
    }

    pub fn source_snapshot(&self) -> BTreeMap<String, Node> {
        snapshot(&self.source())
    }

    pub fn replica_snapshot(&self) -> BTreeMap<String, Node> {
        snapshot(&self.replica())
    }

    /// Assert that the replica holds exactly what the source holds.
    pub fn assert_mirrored(&self) {
        pretty_assertions::assert_eq!(self.replica_snapshot(), self.source_snapshot());
    }

    /// Assert the replica matches the source apart from `except` (relative
    /// replica paths), which must be present in the replica.
    pub fn assert_mirrored_except(&self, except: &[&str]) {
        let mut replica = self.replica_snapshot();
        for rel in except {
            assert!(
                replica.remove(*rel).is_some(),
                "expected '{rel}' to remain in the replica"
            );
        }
        pretty_assertions::assert_eq!(replica, self.source_snapshot());
    }
}

fn write_file(path: &Path, content: &[u8]) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("TestTree: failed to create parent directory");
    }
    fs::write(path, content).expect("TestTree: failed to write file");
    path.to_path_buf()
}
