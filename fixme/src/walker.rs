use ignore::WalkBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::errors::unify_path;
use crate::filters::{is_binary_file, PathMatcher};
use crate::metrics::ScanMetrics;

/// A file selected for scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path relative to the scan root, used for display
    pub path: PathBuf,
    /// Canonical location on disk, used for reading
    pub absolute_path: PathBuf,
}

/// Enumerates the files under a root that should be scanned.
///
/// Excluded directories are pruned before they are entered. Entries are
/// sorted by file name within each directory, so discovery order is stable
/// across runs.
#[derive(Debug, Clone)]
pub struct FileWalker {
    root: PathBuf,
    matcher: Arc<PathMatcher>,
    metrics: ScanMetrics,
}

impl FileWalker {
    pub fn new(root: impl Into<PathBuf>, matcher: PathMatcher, metrics: ScanMetrics) -> Self {
        Self {
            root: root.into(),
            matcher: Arc::new(matcher),
            metrics,
        }
    }

    /// Lazily walks the tree. Unreadable entries are logged and skipped.
    pub fn walk(&self) -> Box<dyn Iterator<Item = FileEntry>> {
        let absolute_root = unify_path(&self.root);

        if self.root.is_file() {
            // A single-file root bypasses the include patterns
            self.metrics.record_discovered();
            return Box::new(std::iter::once(FileEntry {
                path: self.root.clone(),
                absolute_path: absolute_root,
            }));
        }

        let prune_root = self.root.clone();
        let prune_matcher = Arc::clone(&self.matcher);

        let mut builder = WalkBuilder::new(&self.root);
        builder
            .standard_filters(false)
            .hidden(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                if !is_dir || entry.depth() == 0 {
                    return true;
                }
                let relative = entry.path().strip_prefix(&prune_root).unwrap_or(entry.path());
                let pruned = prune_matcher.is_excluded_dir(relative);
                if pruned {
                    debug!("Pruning directory: {}", relative.display());
                }
                !pruned
            });

        let root = self.root.clone();
        let matcher = Arc::clone(&self.matcher);
        let metrics = self.metrics.clone();

        Box::new(builder.build().filter_map(move |result| {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    metrics.record_discovery_error();
                    return None;
                }
            };

            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                return None;
            }

            let relative = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .to_path_buf();

            if !matcher.should_scan(&relative) {
                trace!("Not selected: {}", relative.display());
                return None;
            }

            match is_binary_file(entry.path()) {
                Ok(true) => {
                    debug!("Skipping binary file: {}", relative.display());
                    metrics.record_binary_skip();
                    return None;
                }
                Ok(false) => {}
                // The scan itself reports the read failure
                Err(e) => debug!("Could not sniff {}: {}", relative.display(), e),
            }

            metrics.record_discovered();
            Some(FileEntry {
                absolute_path: absolute_root.join(&relative),
                path: relative,
            })
        }))
    }

    /// Runs the walk on a blocking thread, feeding a bounded channel.
    ///
    /// The walk stops early once the receiver is dropped.
    pub fn spawn(self, capacity: usize) -> (mpsc::Receiver<FileEntry>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::task::spawn_blocking(move || {
            for entry in self.walk() {
                if tx.blocking_send(entry).is_err() {
                    debug!("Scan stopped, ending walk early");
                    break;
                }
            }
        });
        (rx, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn relative_paths(walker: &FileWalker) -> Vec<String> {
        walker
            .walk()
            .map(|e| e.path.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    fn sample_tree() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("src/b.js"), "// TODO: b\n").unwrap();
        fs::write(root.join("src/a.js"), "// TODO: a\n").unwrap();
        fs::write(root.join("src/nested/c.rs"), "// NOTE: c\n").unwrap();
        fs::write(root.join("src/readme.rst"), "TODO: not included\n").unwrap();
        fs::write(root.join("src/blob.js"), b"\0\0\0binary").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "// FIXME\n").unwrap();
        fs::write(root.join(".git/config.js"), "// HACK\n").unwrap();
        fs::write(root.join(".eslintrc.js"), "// XXX: dotfile\n").unwrap();
        fs::write(root.join("Makefile"), "# BUG: make\n").unwrap();
        dir
    }

    #[test]
    fn test_walk_filters_and_prunes() {
        let dir = sample_tree();
        let metrics = ScanMetrics::new();
        let matcher = PathMatcher::new(
            &strings(&["**/*.js", "**/*.rs", "Makefile"]),
            &strings(&["node_modules/**", ".git/**"]),
        );
        let walker = FileWalker::new(dir.path(), matcher, metrics.clone());

        assert_eq!(
            relative_paths(&walker),
            vec![".eslintrc.js", "Makefile", "src/a.js", "src/b.js", "src/nested/c.rs"]
        );

        let stats = metrics.get_stats();
        assert_eq!(stats.files_discovered, 5);
        assert_eq!(stats.binary_files_skipped, 1);
    }

    #[test]
    fn test_walk_order_is_stable() {
        let dir = sample_tree();
        let matcher = PathMatcher::new(&strings(&["**/*.js"]), &strings(&["node_modules/**"]));
        let walker = FileWalker::new(dir.path(), matcher, ScanMetrics::new());
        assert_eq!(relative_paths(&walker), relative_paths(&walker));
    }

    #[test]
    fn test_absolute_paths_point_at_files() {
        let dir = sample_tree();
        let matcher = PathMatcher::new(&strings(&["src/a.js"]), &[]);
        let walker = FileWalker::new(dir.path(), matcher, ScanMetrics::new());

        let entries: Vec<_> = walker.walk().collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].absolute_path.is_absolute());
        assert_eq!(
            fs::read_to_string(&entries[0].absolute_path).unwrap(),
            "// TODO: a\n"
        );
    }

    #[test]
    fn test_single_file_root() {
        let dir = sample_tree();
        let file = dir.path().join("src/readme.rst");
        let matcher = PathMatcher::new(&strings(&["**/*.js"]), &[]);
        let walker = FileWalker::new(&file, matcher, ScanMetrics::new());

        let entries: Vec<_> = walker.walk().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, file);
    }

    #[tokio::test]
    async fn test_spawn_feeds_channel() {
        let dir = sample_tree();
        let matcher = PathMatcher::new(&strings(&["**/*.rs"]), &[]);
        let walker = FileWalker::new(dir.path(), matcher, ScanMetrics::new());

        let (mut rx, handle) = walker.spawn(1);
        let mut seen = Vec::new();
        while let Some(entry) = rx.recv().await {
            seen.push(entry.path);
        }
        handle.await.unwrap();
        assert_eq!(seen, vec![PathBuf::from("src/nested/c.rs")]);
    }
}
