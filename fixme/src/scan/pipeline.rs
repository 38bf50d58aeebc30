use dashmap::DashMap;
use futures::stream::{self, LocalBoxStream, StreamExt};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::matcher::VerbMatcher;
use super::processor::FileProcessor;
use super::scanner::ScanLimits;
use crate::config::ScanConfig;
use crate::errors::{ScanError, ScanResult};
use crate::filters::PathMatcher;
use crate::metrics::ScanMetrics;
use crate::report::Reporter;
use crate::results::{FileScanResult, ScanSummary};
use crate::styles::{all_styles, lookup_style, style_names_for_path};
use crate::verbs::ActiveVerbs;
use crate::walker::{FileEntry, FileWalker};

/// Aborts a running scan from another task.
///
/// Clones share one signal. Once cancelled, a handle stays cancelled.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Every handle is gone, so nobody can cancel any more
            std::future::pending::<()>().await;
        }
    }
}

type ScanOutcome = (FileEntry, ScanResult<FileScanResult>);

/// One scan over one tree.
///
/// The active verb set and the default matcher are computed once when the
/// run is created and never change while it executes. Matchers for strict
/// comment styles are cached in the run and dropped with it.
#[derive(Debug)]
pub struct ScanRun {
    config: ScanConfig,
    active: ActiveVerbs,
    default_matcher: Arc<VerbMatcher>,
    strict_matchers: DashMap<&'static [&'static str], Arc<VerbMatcher>>,
    metrics: ScanMetrics,
    cancel: CancelHandle,
}

impl ScanRun {
    pub fn new(config: ScanConfig) -> Self {
        let active = ActiveVerbs::from_skip(&config.skip);
        debug!(
            "Active verbs: {:?}",
            active.verbs().iter().map(|v| v.name).collect::<Vec<_>>()
        );
        let default_matcher = Arc::new(VerbMatcher::new(
            &active,
            all_styles(),
            config.case_sensitive,
        ));

        Self {
            config,
            active,
            default_matcher,
            strict_matchers: DashMap::new(),
            metrics: ScanMetrics::new(),
            cancel: CancelHandle::new(),
        }
    }

    /// Uses an existing handle so the caller can cancel this run
    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn active_verbs(&self) -> &ActiveVerbs {
        &self.active
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    /// The matcher to use for `path`
    fn matcher_for(&self, path: &Path) -> Arc<VerbMatcher> {
        if !self.config.strict_comment_styles {
            return Arc::clone(&self.default_matcher);
        }
        let Some(names) = style_names_for_path(path) else {
            return Arc::clone(&self.default_matcher);
        };

        if let Some(matcher) = self.strict_matchers.get(&names) {
            self.metrics.record_cache_operation(true);
            return Arc::clone(&matcher);
        }
        self.metrics.record_cache_operation(false);

        debug!("Compiling matcher for styles {:?}", names);
        let styles = names.iter().filter_map(|name| lookup_style(name));
        let matcher = Arc::new(VerbMatcher::new(
            &self.active,
            styles,
            self.config.case_sensitive,
        ));
        Arc::clone(&self.strict_matchers.entry(names).or_insert(matcher))
    }

    /// Scans the configured root, handing each finished file to `reporter`.
    ///
    /// Per-file failures are logged and counted. The run itself fails only
    /// when the root cannot be accessed, the reporter cannot write, or the
    /// run is cancelled; a cancelled run writes no partial file blocks.
    pub async fn execute<W: Write>(&self, reporter: &mut Reporter<W>) -> ScanResult<ScanSummary> {
        let root = self.config.root_path.clone();
        info!("Starting scan of {}", root.display());

        tokio::fs::metadata(&root)
            .await
            .map_err(|e| ScanError::root_inaccessible(&root, e))?;

        let mut cancel_rx = self.cancel.subscribe();
        if *cancel_rx.borrow_and_update() {
            return Err(ScanError::Cancelled);
        }

        let concurrency = self.config.concurrency.get();
        let limits = ScanLimits {
            line_length_limit: self.config.line_length_limit,
            report_long_lines: self.active.reports_line_length(),
        };
        let processor = FileProcessor::new(limits, self.config.encoding(), self.metrics.clone());

        let path_matcher =
            PathMatcher::new(&self.config.file_patterns, &self.config.ignored_directories);
        let walker = FileWalker::new(root, path_matcher, self.metrics.clone());
        let (mut rx, walk_handle) = walker.spawn(concurrency * 2);

        let processor = &processor;
        let scans = stream::poll_fn(move |cx| rx.poll_recv(cx)).map(|entry| async move {
            let matcher = self.matcher_for(&entry.path);
            let outcome = processor.scan_file(&entry, &matcher).await;
            (entry, outcome)
        });

        let mut results: LocalBoxStream<'_, ScanOutcome> = if self.config.ordered_output {
            scans.buffered(concurrency).boxed_local()
        } else {
            scans.buffer_unordered(concurrency).boxed_local()
        };

        let mut summary = ScanSummary::new();
        let drain = async {
            while let Some((entry, outcome)) = results.next().await {
                match outcome {
                    Ok(file_result) => {
                        summary.add_file_result(&file_result);
                        reporter.report(&file_result)?;
                    }
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!("Failed to scan {}: {}", entry.path.display(), e);
                        self.metrics.record_file_failed();
                        summary.add_failure();
                    }
                }
            }
            reporter.flush()
        };

        tokio::select! {
            drained = drain => drained?,
            _ = cancelled(&mut cancel_rx) => {
                info!("Scan cancelled");
                return Err(ScanError::Cancelled);
            }
        }

        if let Err(e) = walk_handle.await {
            warn!("Directory walk ended abnormally: {}", e);
        }

        self.metrics.log_stats();
        info!(
            "Scan complete. Found {} annotations in {} of {} files",
            summary.total_annotations, summary.files_with_annotations, summary.files_scanned
        );

        Ok(summary)
    }
}

/// Scans `config.root_path` and reports every file with annotations
pub async fn scan<W: Write>(config: ScanConfig, reporter: &mut Reporter<W>) -> ScanResult<ScanSummary> {
    ScanRun::new(config).execute(reporter).await
}

/// Like [`scan`], then calls `on_complete` once the whole tree is done
pub async fn scan_with<W, F>(
    config: ScanConfig,
    reporter: &mut Reporter<W>,
    on_complete: F,
) -> ScanResult<ScanSummary>
where
    W: Write,
    F: FnOnce(&ScanSummary),
{
    let summary = scan(config, reporter).await?;
    on_complete(&summary);
    Ok(summary)
}
