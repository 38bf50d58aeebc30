//! Path and content filters used by the walker.
//!
//! Include patterns decide which files are scanned; exclude patterns prune
//! whole directories before they are entered. Both use `glob` syntax where
//! `*` stays within one path component, `**` crosses components, and a
//! leading dot needs no literal match, so `**/*.js` also finds `.eslintrc.js`.
use glob::{MatchOptions, Pattern};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::warn;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Number of leading bytes inspected by the binary sniffer
pub const SNIFF_LEN: usize = 8000;

#[derive(Debug, Clone)]
struct ExcludePattern {
    /// Matched against file and directory paths
    full: Pattern,
    /// `dir/**` reduced to `dir`, so the directory itself can be pruned
    dir: Option<Pattern>,
    /// Pattern without a separator, also tried against the entry name
    bare: bool,
}

/// Include and exclude glob sets for one run
#[derive(Debug, Clone, Default)]
pub struct PathMatcher {
    include: Vec<Pattern>,
    exclude: Vec<ExcludePattern>,
}

impl PathMatcher {
    /// Compiles both pattern sets. Invalid patterns are logged and left out.
    pub fn new(include: &[String], exclude: &[String]) -> Self {
        let include = include.iter().filter_map(|p| compile(p)).collect();
        let exclude = exclude
            .iter()
            .filter_map(|raw| {
                let full = compile(raw)?;
                let dir = raw
                    .strip_suffix("/**")
                    .filter(|d| !d.is_empty())
                    .and_then(compile);
                Some(ExcludePattern {
                    full,
                    dir,
                    bare: !raw.contains('/'),
                })
            })
            .collect();

        Self { include, exclude }
    }

    /// Whether a file at `relative` (to the scan root) matches an include
    /// pattern. Patterns are tried against the whole path and the file name.
    pub fn is_included(&self, relative: &Path) -> bool {
        if self.include.is_empty() {
            return true;
        }
        let path = normalize(relative);
        let name = file_name(relative);
        self.include.iter().any(|p| {
            p.matches_with(&path, MATCH_OPTIONS)
                || name.is_some_and(|n| p.matches_with(n, MATCH_OPTIONS))
        })
    }

    /// Whether the directory at `relative` must not be entered
    pub fn is_excluded_dir(&self, relative: &Path) -> bool {
        let path = normalize(relative);
        let name = file_name(relative);
        self.exclude.iter().any(|p| {
            p.full.matches_with(&path, MATCH_OPTIONS)
                || p.dir
                    .as_ref()
                    .is_some_and(|d| d.matches_with(&path, MATCH_OPTIONS))
                || (p.bare && name.is_some_and(|n| p.full.matches_with(n, MATCH_OPTIONS)))
        })
    }

    /// Whether a file path matches an exclude pattern
    pub fn is_excluded_file(&self, relative: &Path) -> bool {
        let path = normalize(relative);
        self.exclude
            .iter()
            .any(|p| p.full.matches_with(&path, MATCH_OPTIONS))
    }

    /// Include and exclude checks combined
    pub fn should_scan(&self, relative: &Path) -> bool {
        self.is_included(relative) && !self.is_excluded_file(relative)
    }
}

fn compile(raw: &str) -> Option<Pattern> {
    match Pattern::new(raw) {
        Ok(pattern) => Some(pattern),
        Err(e) => {
            warn!("Ignoring invalid glob pattern '{}': {}", raw, e);
            None
        }
    }
}

fn normalize(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// Checks if a file is likely to be binary from its extension alone
pub fn is_likely_binary(path: &Path) -> bool {
    // Common binary file extensions
    const BINARY_EXTENSIONS: &[&str] = &[
        "exe", "dll", "so", "dylib", "bin", "obj", "o", "a", "class", "jar", "war", "ear", "png",
        "jpg", "jpeg", "gif", "bmp", "ico", "webp", "pdf", "doc", "docx", "xls", "xlsx", "zip",
        "tar", "gz", "7z", "rar", "woff", "woff2", "ttf", "otf", "mp3", "mp4", "wasm",
    ];

    if let Some(ext) = path.extension() {
        if let Some(ext_str) = ext.to_str() {
            return BINARY_EXTENSIONS
                .iter()
                .any(|&bin_ext| bin_ext.eq_ignore_ascii_case(ext_str));
        }
    }
    false
}

/// Checks the leading bytes of a file for binary content: any NUL byte, or
/// more than 30% control characters other than common whitespace.
pub fn looks_binary(head: &[u8]) -> bool {
    if head.is_empty() {
        return false;
    }
    if head.contains(&0) {
        return true;
    }
    let control = head
        .iter()
        .filter(|&&b| (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0c | 0x1b)) || b == 0x7f)
        .count();
    control * 10 > head.len() * 3
}

/// Extension check first, then a sniff of the first [`SNIFF_LEN`] bytes
pub fn is_binary_file(path: &Path) -> io::Result<bool> {
    if is_likely_binary(path) {
        return Ok(true);
    }
    let mut head = Vec::with_capacity(SNIFF_LEN);
    File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)?;
    Ok(looks_binary(&head))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_is_included() {
        let matcher = PathMatcher::new(&strings(&["**/*.rs", "Makefile"]), &[]);

        assert!(matcher.is_included(Path::new("main.rs")));
        assert!(matcher.is_included(Path::new("src/deep/lib.rs")));
        assert!(matcher.is_included(Path::new("Makefile")));
        assert!(matcher.is_included(Path::new("build/Makefile"))); // File name match
        assert!(matcher.is_included(Path::new(".hidden/x.rs"))); // Dotfiles need no literal dot

        assert!(!matcher.is_included(Path::new("src/main.py")));
        assert!(!matcher.is_included(Path::new("main.RS"))); // Case sensitive
        assert!(!matcher.is_included(Path::new("Makefile.am")));
    }

    #[test]
    fn test_empty_include_accepts_everything() {
        let matcher = PathMatcher::new(&[], &[]);
        assert!(matcher.is_included(Path::new("anything/at/all.bin")));
    }

    #[test]
    fn test_is_excluded_dir() {
        let matcher = PathMatcher::new(
            &[],
            &strings(&["node_modules/**", "**/build/**", ".git/**", "vendor"]),
        );

        // Should prune
        assert!(matcher.is_excluded_dir(Path::new("node_modules")));
        assert!(matcher.is_excluded_dir(Path::new("node_modules/lodash")));
        assert!(matcher.is_excluded_dir(Path::new("build")));
        assert!(matcher.is_excluded_dir(Path::new("app/build")));
        assert!(matcher.is_excluded_dir(Path::new(".git")));
        assert!(matcher.is_excluded_dir(Path::new("lib/vendor"))); // Bare name, any depth

        // Should not prune
        assert!(!matcher.is_excluded_dir(Path::new("src")));
        assert!(!matcher.is_excluded_dir(Path::new("app/node_modules"))); // Rooted pattern
        assert!(!matcher.is_excluded_dir(Path::new(".git2")));
        assert!(!matcher.is_excluded_dir(Path::new("builder")));
    }

    #[test]
    fn test_is_excluded_file() {
        let matcher = PathMatcher::new(
            &[],
            &strings(&["**/test_[0-4].txt", "target/**/*.rs", "**/*.tmp"]),
        );

        // Should exclude
        assert!(matcher.is_excluded_file(Path::new("test_0.txt")));
        assert!(matcher.is_excluded_file(Path::new("dir/test_2.txt")));
        assert!(matcher.is_excluded_file(Path::new("target/debug/main.rs")));
        assert!(matcher.is_excluded_file(Path::new("src/temp.tmp")));

        // Should not exclude
        assert!(!matcher.is_excluded_file(Path::new("test_5.txt")));
        assert!(!matcher.is_excluded_file(Path::new("src/main.rs")));
    }

    #[test]
    fn test_should_scan() {
        let matcher = PathMatcher::new(&strings(&["**/*.rs"]), &strings(&["target/**/*.rs"]));

        assert!(matcher.should_scan(Path::new("src/main.rs")));
        assert!(matcher.should_scan(Path::new("target.rs")));
        assert!(!matcher.should_scan(Path::new("src/main.py")));
        assert!(!matcher.should_scan(Path::new("target/debug/main.rs")));
    }

    #[test]
    fn test_invalid_patterns_are_skipped() {
        let matcher = PathMatcher::new(&strings(&["[unclosed", "**/*.js"]), &strings(&["[x"]));
        assert!(matcher.is_included(Path::new("a.js")));
        assert!(!matcher.is_included(Path::new("a.css")));
        assert!(!matcher.is_excluded_dir(Path::new("x")));
    }

    #[test]
    fn test_is_likely_binary() {
        assert!(is_likely_binary(Path::new("test.exe")));
        assert!(is_likely_binary(Path::new("test.png")));
        assert!(is_likely_binary(Path::new("test.PDF"))); // Test case insensitivity
        assert!(!is_likely_binary(Path::new("test.rs")));
        assert!(!is_likely_binary(Path::new("test")));
    }

    #[test]
    fn test_looks_binary() {
        assert!(!looks_binary(b""));
        assert!(!looks_binary(b"// TODO: plain text\n\tindented\r\n"));
        assert!(!looks_binary("caf\u{e9} na\u{ef}ve".as_bytes()));
        assert!(!looks_binary(&[0x63, 0x61, 0x66, 0xe9])); // Latin-1 text
        assert!(looks_binary(b"ELF\0\x01\x02"));
        assert!(looks_binary(&[0x01, 0x02, 0x03, b'a', 0x04, 0x05]));
    }

    #[test]
    fn test_is_binary_file() {
        let dir = tempdir().unwrap();

        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "# NOTE: hello\n").unwrap();
        assert!(!is_binary_file(&text).unwrap());

        let blob = dir.path().join("data.dat");
        let mut file = File::create(&blob).unwrap();
        file.write_all(&[0x89, b'P', b'N', b'G', 0x00, 0x1a]).unwrap();
        assert!(is_binary_file(&blob).unwrap());

        // Extension wins even if the file does not exist
        assert!(is_binary_file(&dir.path().join("missing.jar")).unwrap());
        assert!(is_binary_file(&dir.path().join("missing.txt")).is_err());
    }
}
