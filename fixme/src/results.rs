use serde::Serialize;
use std::path::PathBuf;

use crate::verbs::VerbRule;

/// One recognised verb occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    /// The rule that matched; shared with the registry, never copied
    pub verb: &'static VerbRule,
    /// Trimmed author from a `(Name)` clause; never empty
    pub author: Option<String>,
    /// Whole-block trimmed message; may contain newlines
    pub message: Option<String>,
    /// 1-based line on which the verb keyword appears
    pub start_line: usize,
    /// Path of the file, relative to the scan root
    pub file_path: PathBuf,
}

/// Everything found in a single file
#[derive(Debug, Clone, Serialize)]
pub struct FileScanResult {
    /// Display path, relative to the scan root
    pub path: PathBuf,
    /// Number of physical lines read
    pub total_lines: usize,
    /// Annotations in the order their verbs were recognised
    pub annotations: Vec<Annotation>,
}

impl FileScanResult {
    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }
}

/// Totals for a complete run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Files that were read to the end
    pub files_scanned: usize,
    /// Files that produced at least one annotation
    pub files_with_annotations: usize,
    /// Total number of annotations across all files
    pub total_annotations: usize,
    /// Files abandoned because of an I/O error
    pub files_failed: usize,
}

impl ScanSummary {
    /// Creates an empty summary
    pub fn new() -> Self {
        Default::default()
    }

    /// Accounts for one completed file
    pub fn add_file_result(&mut self, file_result: &FileScanResult) {
        self.files_scanned += 1;
        if !file_result.annotations.is_empty() {
            self.total_annotations += file_result.annotations.len();
            self.files_with_annotations += 1;
        }
    }

    /// Accounts for one file whose scan was aborted
    pub fn add_failure(&mut self) {
        self.files_failed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verbs::lookup_verb;

    fn annotation(verb: &str, line: usize) -> Annotation {
        Annotation {
            verb: lookup_verb(verb).unwrap(),
            author: None,
            message: Some("message".to_string()),
            start_line: line,
            file_path: PathBuf::from("test.js"),
        }
    }

    #[test]
    fn test_summary_new() {
        let summary = ScanSummary::new();
        assert_eq!(summary.files_scanned, 0);
        assert_eq!(summary.files_with_annotations, 0);
        assert_eq!(summary.total_annotations, 0);
        assert_eq!(summary.files_failed, 0);
    }

    #[test]
    fn test_summary_add_file_result() {
        let mut summary = ScanSummary::new();

        summary.add_file_result(&FileScanResult {
            path: PathBuf::from("test1.js"),
            total_lines: 10,
            annotations: vec![annotation("todo", 1), annotation("fixme", 4)],
        });
        assert_eq!(summary.files_scanned, 1);
        assert_eq!(summary.files_with_annotations, 1);
        assert_eq!(summary.total_annotations, 2);

        // A silent file still counts as scanned
        summary.add_file_result(&FileScanResult {
            path: PathBuf::from("test2.js"),
            total_lines: 3,
            annotations: vec![],
        });
        assert_eq!(summary.files_scanned, 2);
        assert_eq!(summary.files_with_annotations, 1);
        assert_eq!(summary.total_annotations, 2);
    }

    #[test]
    fn test_annotation_serializes_verb_inline() {
        let value = serde_json::to_value(annotation("todo", 7)).unwrap();
        assert_eq!(value["verb"]["name"], "todo");
        assert_eq!(value["verb"]["severity"], "action");
        assert_eq!(value["start_line"], 7);
        assert!(value["author"].is_null());
    }
}
