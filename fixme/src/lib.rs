pub mod config;
pub mod errors;
pub mod filters;
pub mod metrics;
pub mod report;
pub mod results;
pub mod scan;
pub mod styles;
pub mod verbs;
pub mod walker;

pub use config::{OutputFormat, ScanConfig, ScanOverrides, TextEncoding};
pub use errors::{ScanError, ScanResult};
pub use metrics::{ScanMetrics, ScanStats};
pub use report::{Reporter, Styler, NO_MESSAGE_PLACEHOLDER};
pub use results::{Annotation, FileScanResult, ScanSummary};
pub use scan::{scan, scan_with, CancelHandle, ScanRun};
pub use styles::{lookup_style, CommentStyle};
pub use verbs::{active_verbs, ActiveVerbs, Severity, VerbRule};
pub use walker::{FileEntry, FileWalker};
