//! Annotation extraction.
//!
//! [`VerbMatcher`] finds verbs behind comment openers on a single line,
//! [`AnnotationScanner`] threads multi-line comments through a file,
//! [`FileProcessor`] streams a file's lines into a scanner, and
//! [`ScanRun`] drives the whole tree with bounded concurrency.

pub mod matcher;
pub mod pipeline;
pub mod processor;
pub mod scanner;

pub use matcher::{Opener, VerbHit, VerbMatcher};
pub use pipeline::{scan, scan_with, CancelHandle, ScanRun};
pub use processor::FileProcessor;
pub use scanner::{scan_lines, AnnotationScanner, ScanLimits};
