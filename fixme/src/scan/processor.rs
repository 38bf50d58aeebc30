use std::borrow::Cow;
use std::io;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{trace, warn};

use super::matcher::VerbMatcher;
use super::scanner::{AnnotationScanner, ScanLimits};
use crate::config::TextEncoding;
use crate::errors::{ScanError, ScanResult};
use crate::metrics::ScanMetrics;
use crate::results::FileScanResult;
use crate::walker::FileEntry;

// Constants for file processing
const BUFFER_CAPACITY: usize = 64 * 1024;
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Decodes one line of raw bytes. Sets `replaced` when a byte could not be
/// represented and was substituted with U+FFFD.
fn decode_line<'a>(bytes: &'a [u8], encoding: TextEncoding, replaced: &mut bool) -> Cow<'a, str> {
    if let Ok(valid) = std::str::from_utf8(bytes) {
        if encoding == TextEncoding::Utf8 || valid.is_ascii() {
            return Cow::Borrowed(valid);
        }
    }

    match encoding {
        TextEncoding::Utf8 => {
            *replaced = true;
            String::from_utf8_lossy(bytes)
        }
        TextEncoding::Latin1 => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
        TextEncoding::Ascii => {
            *replaced = true;
            Cow::Owned(
                bytes
                    .iter()
                    .map(|&b| if b.is_ascii() { b as char } else { '\u{FFFD}' })
                    .collect(),
            )
        }
    }
}

/// Bytes kept per line for a character limit. A UTF-8 character is at most
/// four bytes, so anything longer is too long whatever it decodes to.
fn line_byte_cap(line_length_limit: usize) -> usize {
    line_length_limit.saturating_mul(4).saturating_add(4)
}

/// Reads one line into `buf`, keeping at most `cap` bytes of it. The rest
/// of the line is consumed and dropped.
///
/// Returns `None` at end of input, otherwise whether the line was cut.
async fn read_capped_line<R>(reader: &mut R, buf: &mut Vec<u8>, cap: usize) -> io::Result<Option<bool>>
where
    R: AsyncBufRead + Unpin,
{
    let mut read_any = false;
    let mut truncated = false;

    loop {
        let (used, done) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(read_any.then_some(truncated));
            }
            read_any = true;

            let (chunk, done) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (&available[..=i], true),
                None => (available, false),
            };
            let room = cap.saturating_sub(buf.len());
            if chunk.len() > room {
                truncated = true;
            }
            buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
            (chunk.len(), done)
        };
        reader.consume(used);

        if done {
            return Ok(Some(truncated));
        }
    }
}

fn strip_line_ending(buf: &mut Vec<u8>) {
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
}

/// Streams files line by line through an [`AnnotationScanner`]
#[derive(Debug, Clone)]
pub struct FileProcessor {
    limits: ScanLimits,
    encoding: TextEncoding,
    metrics: ScanMetrics,
}

impl FileProcessor {
    pub fn new(limits: ScanLimits, encoding: TextEncoding, metrics: ScanMetrics) -> Self {
        Self {
            limits,
            encoding,
            metrics,
        }
    }

    /// Gets the shared run metrics
    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    /// Scans one file. Only one line is held in memory at a time.
    pub async fn scan_file(
        &self,
        entry: &FileEntry,
        matcher: &VerbMatcher,
    ) -> ScanResult<FileScanResult> {
        trace!("Processing file: {}", entry.path.display());

        let file = File::open(&entry.absolute_path)
            .await
            .map_err(|e| ScanError::from_io(&entry.path, e))?;
        let mut reader = BufReader::with_capacity(BUFFER_CAPACITY, file);

        let mut scanner = AnnotationScanner::new(matcher, &entry.path, self.limits);
        let cap = line_byte_cap(self.limits.line_length_limit);
        let mut buf = Vec::with_capacity(256);
        let mut replaced = false;

        loop {
            buf.clear();
            let read = read_capped_line(&mut reader, &mut buf, cap)
                .await
                .map_err(|e| ScanError::from_io(&entry.path, e))?;
            let Some(truncated) = read else {
                break;
            };
            if truncated {
                scanner.feed_overlong_line();
                continue;
            }
            strip_line_ending(&mut buf);

            let mut bytes = buf.as_slice();
            if scanner.lines_seen() == 0 && self.encoding == TextEncoding::Utf8 {
                bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
            }
            let line = decode_line(bytes, self.encoding, &mut replaced);
            scanner.feed_line(&line);
        }

        if replaced {
            warn!(
                "Undecodable bytes replaced in file: {}",
                entry.path.display()
            );
        }

        let long_lines = scanner.long_lines();
        let result = scanner.into_result();
        self.metrics
            .record_file_scanned(result.total_lines, long_lines, result.annotations.len());
        Ok(result)
    }
}
