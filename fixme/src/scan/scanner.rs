//! Per-file annotation state machine.
//!
//! The scanner is fed one physical line at a time and never looks back.
//! Its state between lines is one of:
//!
//! - **Scanning**: outside any comment we care about. Each line is searched
//!   for `opener [decoration] [@]VERB [(author)] [:] message`.
//! - **InComment**: inside a block comment that opened at the start of an
//!   earlier line without a verb. A verb at the start of an inner line
//!   (after an optional continuation marker such as ` * `) begins an
//!   annotation.
//! - **Continuing**: a block-comment annotation whose close token has not
//!   been seen yet. Every line is appended to its message until the close
//!   token appears; scanning then resumes after the token.
//!
//! Annotations are recorded the moment their verb is recognised, so the
//! output order is always the order of `start_line` even while a
//! multi-line message is still being collected.

use std::path::PathBuf;

use super::matcher::{Opener, VerbHit, VerbMatcher};
use crate::results::{Annotation, FileScanResult};
use crate::verbs::{VerbRule, LINE_LENGTH_DIAGNOSTIC};

/// Per-line limits applied by the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanLimits {
    /// Lines with more characters than this are not scanned
    pub line_length_limit: usize,
    /// Emit a diagnostic annotation for each skipped line
    pub report_long_lines: bool,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            line_length_limit: 1000,
            report_long_lines: true,
        }
    }
}

#[derive(Debug)]
enum ScanState {
    Scanning,
    InComment(Opener),
    Continuing(Pending),
}

/// A multi-line annotation waiting for its close token
#[derive(Debug)]
struct Pending {
    index: usize,
    close: &'static str,
    continuation: Option<&'static str>,
    fragments: Vec<String>,
}

/// Scans the lines of one file for annotations
#[derive(Debug)]
pub struct AnnotationScanner<'m> {
    matcher: &'m VerbMatcher,
    file_path: PathBuf,
    limits: ScanLimits,
    line_number: usize,
    long_lines: usize,
    state: ScanState,
    annotations: Vec<Annotation>,
}

impl<'m> AnnotationScanner<'m> {
    pub fn new(matcher: &'m VerbMatcher, file_path: impl Into<PathBuf>, limits: ScanLimits) -> Self {
        Self {
            matcher,
            file_path: file_path.into(),
            limits,
            line_number: 0,
            long_lines: 0,
            state: ScanState::Scanning,
            annotations: Vec::new(),
        }
    }

    /// Number of lines fed so far
    pub fn lines_seen(&self) -> usize {
        self.line_number
    }

    /// Number of lines skipped for exceeding the length limit
    pub fn long_lines(&self) -> usize {
        self.long_lines
    }

    /// Whether a multi-line annotation is still waiting for its close token
    pub fn is_continuing(&self) -> bool {
        matches!(self.state, ScanState::Continuing(_))
    }

    /// Feeds the next physical line, without its line terminator
    pub fn feed_line(&mut self, line: &str) {
        self.line_number += 1;

        if is_too_long(line, self.limits.line_length_limit) {
            self.skip_long_line();
            return;
        }

        let resume = match std::mem::replace(&mut self.state, ScanState::Scanning) {
            ScanState::Scanning => Some(0),
            ScanState::Continuing(pending) => self.continue_pending(line, pending),
            ScanState::InComment(opener) => self.scan_comment_body(line, opener),
        };

        if let Some(from) = resume {
            self.scan_from(line, from);
        }
    }

    /// Counts a line already known to exceed the length limit, without
    /// its content
    pub fn feed_overlong_line(&mut self) {
        self.line_number += 1;
        self.skip_long_line();
    }

    fn skip_long_line(&mut self) {
        self.long_lines += 1;
        if self.limits.report_long_lines {
            let message = format!(
                "Skipping this line because its length is greater than the maximum line length of {}.",
                self.limits.line_length_limit
            );
            let index = self.open_annotation(&LINE_LENGTH_DIAGNOSTIC, None);
            self.annotations[index].message = Some(message);
        }
    }

    /// Finalises any truncated annotation and returns everything found
    pub fn finish(mut self) -> Vec<Annotation> {
        if let ScanState::Continuing(pending) =
            std::mem::replace(&mut self.state, ScanState::Scanning)
        {
            self.finalize(pending);
        }
        self.annotations
    }

    /// Finishes the scan and packages the per-file result
    pub fn into_result(self) -> FileScanResult {
        let path = self.file_path.clone();
        let total_lines = self.line_number;
        FileScanResult {
            path,
            total_lines,
            annotations: self.finish(),
        }
    }

    /// Appends a line to the in-flight annotation. Returns where scanning
    /// resumes when the close token is on this line.
    fn continue_pending(&mut self, line: &str, mut pending: Pending) -> Option<usize> {
        let close_at = line.find(pending.close);
        let segment = &line[..close_at.unwrap_or(line.len())];
        pending
            .fragments
            .push(strip_continuation(segment, pending.continuation).to_string());

        match close_at {
            Some(at) => {
                let resume = at + pending.close.len();
                self.finalize(pending);
                Some(resume)
            }
            None => {
                self.state = ScanState::Continuing(pending);
                None
            }
        }
    }

    /// Handles a line inside a verb-less block comment
    fn scan_comment_body(&mut self, line: &str, opener: Opener) -> Option<usize> {
        let Some(close) = opener.close() else {
            return Some(0);
        };
        let close_at = line.find(close);
        let segment = &line[..close_at.unwrap_or(line.len())];

        if let Some(hit) = self.matcher.block_line_hit(segment, opener) {
            let index = self.open_annotation(hit.verb, hit.author);
            let body = &segment[hit.body_start..];

            if close_at.is_none() {
                self.state = ScanState::Continuing(Pending {
                    index,
                    close,
                    continuation: continuation_of(opener),
                    fragments: vec![body.to_string()],
                });
                return None;
            }
            self.annotations[index].message = normalize_message(body);
        }

        match close_at {
            Some(at) => Some(at + close.len()),
            None => {
                self.state = ScanState::InComment(opener);
                None
            }
        }
    }

    /// Searches `line[from..]` for verbs while in the Scanning state
    fn scan_from(&mut self, line: &str, from: usize) {
        let mut next = self.matcher.next_hit(line, from);
        // Block openers after a line comment cannot carry past this line
        let mut in_line_comment = false;

        while let Some(hit) = next.take() {
            let VerbHit {
                verb,
                author,
                body_start,
                opener,
                ..
            } = hit;
            let index = self.open_annotation(verb, author);

            match opener {
                Opener::Line => {
                    in_line_comment = true;
                    next = self.matcher.next_hit(line, body_start);
                    let end = next.as_ref().map_or(line.len(), |n| n.start);
                    self.annotations[index].message = normalize_message(&line[body_start..end]);
                }
                Opener::Block {
                    close,
                    continuation,
                } => match line[body_start..].find(close) {
                    Some(offset) => {
                        let close_at = body_start + offset;
                        self.annotations[index].message =
                            normalize_message(&line[body_start..close_at]);
                        next = self.matcher.next_hit(line, close_at + close.len());
                    }
                    None if in_line_comment => {
                        self.annotations[index].message = normalize_message(&line[body_start..]);
                        return;
                    }
                    None => {
                        self.state = ScanState::Continuing(Pending {
                            index,
                            close,
                            continuation,
                            fragments: vec![line[body_start..].to_string()],
                        });
                        return;
                    }
                },
            }
        }

        if from == 0 {
            if let Some((token_end, opener)) = self.matcher.leading_block_opener(line) {
                if let Some(close) = opener.close() {
                    if !line[token_end..].contains(close) {
                        self.state = ScanState::InComment(opener);
                    }
                }
            }
        }
    }

    fn open_annotation(&mut self, verb: &'static VerbRule, author: Option<String>) -> usize {
        self.annotations.push(Annotation {
            verb,
            author,
            message: None,
            start_line: self.line_number,
            file_path: self.file_path.clone(),
        });
        self.annotations.len() - 1
    }

    fn finalize(&mut self, pending: Pending) {
        let message = pending.fragments.join("\n");
        self.annotations[pending.index].message = normalize_message(&message);
    }
}

/// Runs a scanner over every line of `lines`
pub fn scan_lines<'m, I, S>(
    matcher: &'m VerbMatcher,
    file_path: impl Into<PathBuf>,
    limits: ScanLimits,
    lines: I,
) -> FileScanResult
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut scanner = AnnotationScanner::new(matcher, file_path, limits);
    for line in lines {
        scanner.feed_line(line.as_ref());
    }
    scanner.into_result()
}

fn is_too_long(line: &str, limit: usize) -> bool {
    line.len() > limit && line.chars().count() > limit
}

fn continuation_of(opener: Opener) -> Option<&'static str> {
    match opener {
        Opener::Block { continuation, .. } => continuation,
        Opener::Line => None,
    }
}

/// Drops a leading ` * ` style marker; anything else is kept verbatim.
fn strip_continuation<'a>(segment: &'a str, marker: Option<&str>) -> &'a str {
    let Some(marker) = marker else {
        return segment;
    };
    match segment.trim_start().strip_prefix(marker) {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
        None => segment,
    }
}

fn normalize_message(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
