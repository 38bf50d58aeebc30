use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Run counters shared by the walker thread and the scan tasks
#[derive(Debug, Clone)]
pub struct ScanMetrics {
    // Discovery metrics
    files_discovered: Arc<AtomicU64>,
    binary_files_skipped: Arc<AtomicU64>,
    discovery_errors: Arc<AtomicU64>,

    // File processing metrics
    files_scanned: Arc<AtomicU64>,
    files_failed: Arc<AtomicU64>,
    lines_scanned: Arc<AtomicU64>,
    long_lines_skipped: Arc<AtomicU64>,
    annotations_found: Arc<AtomicU64>,

    // Matcher cache metrics
    cache_hits: Arc<AtomicU64>,
    cache_misses: Arc<AtomicU64>,
}

impl ScanMetrics {
    /// Creates a new ScanMetrics instance
    pub fn new() -> Self {
        Self {
            files_discovered: Arc::new(AtomicU64::new(0)),
            binary_files_skipped: Arc::new(AtomicU64::new(0)),
            discovery_errors: Arc::new(AtomicU64::new(0)),
            files_scanned: Arc::new(AtomicU64::new(0)),
            files_failed: Arc::new(AtomicU64::new(0)),
            lines_scanned: Arc::new(AtomicU64::new(0)),
            long_lines_skipped: Arc::new(AtomicU64::new(0)),
            annotations_found: Arc::new(AtomicU64::new(0)),
            cache_hits: Arc::new(AtomicU64::new(0)),
            cache_misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records a file yielded by the walker
    pub fn record_discovered(&self) {
        self.files_discovered.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a file rejected by the binary sniffer
    pub fn record_binary_skip(&self) {
        self.binary_files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an unreadable directory entry
    pub fn record_discovery_error(&self) {
        self.discovery_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a file read to the end
    pub fn record_file_scanned(&self, lines: usize, long_lines: usize, annotations: usize) {
        self.files_scanned.fetch_add(1, Ordering::Relaxed);
        self.lines_scanned.fetch_add(lines as u64, Ordering::Relaxed);
        self.long_lines_skipped
            .fetch_add(long_lines as u64, Ordering::Relaxed);
        self.annotations_found
            .fetch_add(annotations as u64, Ordering::Relaxed);
        debug!(
            "File scanned: {} lines, {} annotations",
            lines, annotations
        );
    }

    /// Records a file abandoned because of an I/O error
    pub fn record_file_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a strict-style matcher lookup
    pub fn record_cache_operation(&self, hit: bool) {
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Gets a snapshot of the counters
    pub fn get_stats(&self) -> ScanStats {
        ScanStats {
            files_discovered: self.files_discovered.load(Ordering::Relaxed),
            binary_files_skipped: self.binary_files_skipped.load(Ordering::Relaxed),
            discovery_errors: self.discovery_errors.load(Ordering::Relaxed),
            files_scanned: self.files_scanned.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            lines_scanned: self.lines_scanned.load(Ordering::Relaxed),
            long_lines_skipped: self.long_lines_skipped.load(Ordering::Relaxed),
            annotations_found: self.annotations_found.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }

    /// Logs the counters at info level
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Scan stats:\n\
             Files discovered: {}\n\
             Binary files skipped: {}\n\
             Discovery errors: {}\n\
             Files scanned/failed: {}/{}\n\
             Lines scanned (skipped as too long): {} ({})\n\
             Annotations found: {}\n\
             Matcher cache hits/misses: {}/{}",
            stats.files_discovered,
            stats.binary_files_skipped,
            stats.discovery_errors,
            stats.files_scanned,
            stats.files_failed,
            stats.lines_scanned,
            stats.long_lines_skipped,
            stats.annotations_found,
            stats.cache_hits,
            stats.cache_misses
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`ScanMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub files_discovered: u64,
    pub binary_files_skipped: u64,
    pub discovery_errors: u64,
    pub files_scanned: u64,
    pub files_failed: u64,
    pub lines_scanned: u64,
    pub long_lines_skipped: u64,
    pub annotations_found: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}
