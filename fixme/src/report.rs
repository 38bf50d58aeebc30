//! Formatting of per-file results.
//!
//! Every format renders a whole file into one string which is written with
//! a single `write_all`, so blocks from different files never interleave
//! below file granularity. Files without annotations produce no output.

use colored::Colorize;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::config::OutputFormat;
use crate::errors::ScanResult;
use crate::results::{Annotation, FileScanResult};
use crate::verbs::Severity;

/// Shown in place of an absent message
pub const NO_MESSAGE_PLACEHOLDER: &str = "[[no message to display]]";

/// Severity-driven terminal styling. When disabled every method returns
/// its input unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Styler {
    enabled: bool,
}

impl Styler {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn plain() -> Self {
        Self::new(false)
    }

    /// Colors `text` according to `severity`
    pub fn paint(&self, text: &str, severity: Severity) -> String {
        if !self.enabled {
            return text.to_string();
        }
        match severity {
            Severity::Info => text.blue(),
            Severity::Note => text.green(),
            Severity::Warning => text.magenta(),
            Severity::Action => text.yellow(),
            Severity::Danger => text.red(),
            Severity::Critical => text.white().on_red(),
        }
        .to_string()
    }

    fn label(&self, text: &str, severity: Severity) -> String {
        if !self.enabled {
            return text.to_string();
        }
        self.paint(text, severity).bold().to_string()
    }

    fn dim(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }
        text.dimmed().to_string()
    }

    fn strong(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }
        text.white().bold().to_string()
    }
}

impl Default for Styler {
    fn default() -> Self {
        Self::plain()
    }
}

#[derive(Serialize)]
struct JsonAnnotation<'a> {
    line: usize,
    verb: &'a str,
    label: &'a str,
    severity: Severity,
    author: Option<&'a str>,
    message: Option<&'a str>,
}

#[derive(Serialize)]
struct JsonFile<'a> {
    path: String,
    total_lines: usize,
    annotations: Vec<JsonAnnotation<'a>>,
}

/// Writes file blocks to a sink
#[derive(Debug)]
pub struct Reporter<W: Write> {
    writer: W,
    format: OutputFormat,
    styler: Styler,
}

impl<W: Write> Reporter<W> {
    pub fn new(writer: W, format: OutputFormat, styler: Styler) -> Self {
        Self {
            writer,
            format,
            styler,
        }
    }

    /// Plain text report without colors
    pub fn plain(writer: W) -> Self {
        Self::new(writer, OutputFormat::Text, Styler::plain())
    }

    /// Renders and writes one file's block. Returns whether anything was written.
    pub fn report(&mut self, result: &FileScanResult) -> ScanResult<bool> {
        match self.render(result)? {
            Some(block) => {
                self.writer.write_all(block.as_bytes())?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Renders one file's block, or `None` for a file without annotations
    pub fn render(&self, result: &FileScanResult) -> ScanResult<Option<String>> {
        if result.is_empty() {
            return Ok(None);
        }
        let block = match self.format {
            OutputFormat::Text => self.render_text(result),
            OutputFormat::Markdown => render_markdown(result),
            OutputFormat::Json => render_json(result)?,
        };
        Ok(Some(block))
    }

    pub fn flush(&mut self) -> ScanResult<()> {
        Ok(self.writer.flush()?)
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn render_text(&self, result: &FileScanResult) -> String {
        let styler = &self.styler;
        let width = line_number_width(result.total_lines);
        let mut out = String::from("\n");

        out.push_str(&styler.strong(&display_path(&result.path)));
        out.push(' ');
        out.push_str(&styler.dim(&format!("[{}]:", count_noun(result.annotations.len()))));
        out.push('\n');

        for annotation in &result.annotations {
            let severity = annotation.verb.severity;
            let prefix = format!("  [Line {:>width$}] ", annotation.start_line, width = width);
            let indent = " ".repeat(prefix.chars().count());

            out.push_str(&styler.dim(&prefix));
            out.push_str(&styler.label(&header(annotation), severity));

            match annotation.message.as_deref() {
                Some(message) => {
                    for (i, line) in message.lines().enumerate() {
                        if i > 0 {
                            out.push('\n');
                            if line.is_empty() {
                                continue;
                            }
                            out.push_str(&indent);
                        }
                        out.push_str(&styler.paint(line, severity));
                    }
                }
                None => out.push_str(&styler.dim(NO_MESSAGE_PLACEHOLDER)),
            }
            out.push('\n');
        }
        out
    }
}

/// `✓ TODO from Jimmbo: `
fn header(annotation: &Annotation) -> String {
    match annotation.author.as_deref() {
        Some(author) => format!("{} from {}: ", annotation.verb.label, author),
        None => format!("{}: ", annotation.verb.label),
    }
}

fn render_markdown(result: &FileScanResult) -> String {
    let mut out = format!(
        "### `{}` ({})\n\n",
        display_path(&result.path),
        count_noun(result.annotations.len())
    );
    for annotation in &result.annotations {
        out.push_str(&format!(
            "- **Line {}** {}",
            annotation.start_line,
            header(annotation)
        ));
        let message = annotation.message.as_deref().unwrap_or(NO_MESSAGE_PLACEHOLDER);
        for (i, line) in message.lines().enumerate() {
            if i > 0 {
                out.push('\n');
                if !line.is_empty() {
                    out.push_str("  ");
                }
            }
            out.push_str(line);
        }
        out.push('\n');
    }
    out.push('\n');
    out
}

fn render_json(result: &FileScanResult) -> ScanResult<String> {
    let file = JsonFile {
        path: display_path(&result.path),
        total_lines: result.total_lines,
        annotations: result
            .annotations
            .iter()
            .map(|a| JsonAnnotation {
                line: a.start_line,
                verb: a.verb.name,
                label: a.verb.label,
                severity: a.verb.severity,
                author: a.author.as_deref(),
                message: a.message.as_deref(),
            })
            .collect(),
    };
    let mut line = serde_json::to_string(&file)?;
    line.push('\n');
    Ok(line)
}

fn count_noun(count: usize) -> String {
    if count == 1 {
        "1 message".to_string()
    } else {
        format!("{count} messages")
    }
}

/// Digit count of the file's line count, at least one
fn line_number_width(total_lines: usize) -> usize {
    total_lines.max(1).to_string().len()
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verbs::lookup_verb;
    use std::path::PathBuf;

    fn annotation(verb: &str, line: usize, author: Option<&str>, message: Option<&str>) -> Annotation {
        Annotation {
            verb: lookup_verb(verb).unwrap(),
            author: author.map(String::from),
            message: message.map(String::from),
            start_line: line,
            file_path: PathBuf::from("src/app.js"),
        }
    }

    fn result(total_lines: usize, annotations: Vec<Annotation>) -> FileScanResult {
        FileScanResult {
            path: PathBuf::from("src/app.js"),
            total_lines,
            annotations,
        }
    }

    fn render_plain(result: &FileScanResult) -> String {
        let mut reporter = Reporter::plain(Vec::new());
        reporter.report(result).unwrap();
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn test_single_annotation_text() {
        let output = render_plain(&result(
            1,
            vec![annotation("todo", 1, Some("Jimmbo"), Some("Have a party."))],
        ));
        assert_eq!(
            output,
            "\nsrc/app.js [1 message]:\n  [Line 1] ✓ TODO from Jimmbo: Have a party.\n"
        );
    }

    #[test]
    fn test_padding_follows_total_lines() {
        let output = render_plain(&result(
            120,
            vec![
                annotation("note", 3, None, Some("early")),
                annotation("bug", 117, None, None),
            ],
        ));
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines[1], "src/app.js [2 messages]:");
        assert_eq!(lines[2], "  [Line   3] ✐ NOTE: early");
        assert_eq!(lines[3], "  [Line 117] ☢ BUG: [[no message to display]]");
    }

    #[test]
    fn test_multi_line_message_is_indented() {
        let output = render_plain(&result(
            9,
            vec![annotation("note", 2, None, Some("A note\nwhose content\n\n  spans"))],
        ));
        assert_eq!(
            output,
            "\nsrc/app.js [1 message]:\n  [Line 2] ✐ NOTE: A note\n           whose content\n\n             spans\n"
        );
    }

    #[test]
    fn test_blank_message_lines_have_no_trailing_whitespace() {
        let file = result(3, vec![annotation("todo", 1, None, Some("top\n\nbottom"))]);
        let text = render_plain(&file);
        let markdown = Reporter::new(Vec::new(), OutputFormat::Markdown, Styler::plain())
            .render(&file)
            .unwrap()
            .unwrap();

        for output in [text, markdown] {
            assert!(output.lines().all(|l| l == l.trim_end()), "{:?}", output);
            assert!(output.contains("top\n\n"));
        }
    }

    #[test]
    fn test_silent_file_emits_nothing() {
        let mut reporter = Reporter::plain(Vec::new());
        assert!(!reporter.report(&result(10, vec![])).unwrap());
        assert!(reporter.get_ref().is_empty());

        let json = Reporter::new(Vec::new(), OutputFormat::Json, Styler::plain());
        assert!(json.render(&result(10, vec![])).unwrap().is_none());
    }

    #[test]
    fn test_markdown_block() {
        let reporter = Reporter::new(Vec::new(), OutputFormat::Markdown, Styler::plain());
        let block = reporter
            .render(&result(
                5,
                vec![
                    annotation("fixme", 1, Some("ana"), Some("first\nsecond")),
                    annotation("hack", 4, None, None),
                ],
            ))
            .unwrap()
            .unwrap();
        assert_eq!(
            block,
            "### `src/app.js` (2 messages)\n\n\
             - **Line 1** ☠ FIXME from ana: first\n  second\n\
             - **Line 4** ✄ HACK: [[no message to display]]\n\n"
        );
    }

    #[test]
    fn test_json_block() {
        let reporter = Reporter::new(Vec::new(), OutputFormat::Json, Styler::plain());
        let block = reporter
            .render(&result(3, vec![annotation("todo", 2, None, Some("x"))]))
            .unwrap()
            .unwrap();
        assert!(block.ends_with('\n'));

        let value: serde_json::Value = serde_json::from_str(block.trim_end()).unwrap();
        assert_eq!(value["path"], "src/app.js");
        assert_eq!(value["total_lines"], 3);
        assert_eq!(value["annotations"][0]["line"], 2);
        assert_eq!(value["annotations"][0]["verb"], "todo");
        assert_eq!(value["annotations"][0]["severity"], "action");
        assert!(value["annotations"][0]["author"].is_null());
    }

    #[test]
    fn test_disabled_styler_is_identity() {
        let styler = Styler::plain();
        assert_eq!(styler.paint("☠ FIXME: ", Severity::Danger), "☠ FIXME: ");
        assert_eq!(styler.dim("[Line 1] "), "[Line 1] ");
    }

    #[test]
    fn test_styling_keeps_text_content() {
        colored::control::set_override(true);
        let styled = Styler::new(true).paint("✓ TODO: ", Severity::Action);
        colored::control::unset_override();

        assert!(styled.contains("✓ TODO: "));
        assert_ne!(styled, "✓ TODO: ");
    }
}
