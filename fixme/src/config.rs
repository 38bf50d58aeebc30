use config::{Config as ConfigBuilder, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::errors::{ScanError, ScanResult};

/// Options for one scan run.
///
/// # Configuration Locations
///
/// Values are layered, later sources winning:
/// 1. Global `$CONFIG_DIR/fixme/config.yaml`
/// 2. Local `.fixme.yaml` in the current directory
/// 3. A file named with the `--config` flag
///
/// Command-line flags are applied last through [`ScanOverrides`].
///
/// # Configuration Format
///
/// ```yaml
/// # Directory to scan
/// root_path: "."
///
/// # Directories to prune (glob syntax)
/// ignored_directories:
///   - "node_modules/**"
///   - "vendor/**"
///
/// # Files to scan (glob syntax, matched against the relative path or the file name)
/// file_patterns:
///   - "**/*.rs"
///   - "Makefile"
///
/// # utf8, latin1 or ascii
/// file_encoding: "utf8"
///
/// # Lines longer than this are reported instead of scanned
/// line_length_limit: 1000
///
/// # Verbs (or the line_length diagnostic) to leave out
/// skip:
///   - "note"
///
/// # Files scanned at once (default: CPU cores)
/// concurrency: 8
///
/// # text, markdown or json
/// format: "text"
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "warn"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory (or single file) to scan
    pub root_path: PathBuf,

    /// Directory patterns whose contents are never enumerated
    /// Examples:
    /// - "node_modules/**": prune every node_modules directory at the root
    /// - "**/build/**": prune build directories at any depth
    pub ignored_directories: Vec<String>,

    /// Files that are scanned. An empty list accepts every non-binary file.
    pub file_patterns: Vec<String>,

    /// Name of the text encoding used to decode files
    pub file_encoding: String,

    /// Lines with more characters than this are not scanned
    pub line_length_limit: usize,

    /// Verb names (or `line_length`) excluded from this run
    pub skip: Vec<String>,

    /// Maximum number of files scanned concurrently
    pub concurrency: NonZeroUsize,

    /// Only accept upper-case verb keywords
    pub case_sensitive: bool,

    /// Only accept the comment styles conventional for each file's extension
    pub strict_comment_styles: bool,

    /// Emit file blocks in discovery order even when scanning concurrently.
    /// When false, blocks are emitted as files finish.
    pub ordered_output: bool,

    /// Colorize the text report
    pub color: bool,

    /// Report format
    pub format: OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Report layouts understood by the reporter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Markdown,
    Json,
}

impl FromStr for OutputFormat {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            other => Err(ScanError::config_error(format!(
                "Unknown output format: {other}"
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Json => "json",
        })
    }
}

/// Text encodings a file can be decoded with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8; invalid sequences are replaced with U+FFFD
    Utf8,
    /// ISO-8859-1; every byte maps to the code point of the same value
    Latin1,
    /// 7-bit ASCII; bytes above 0x7F are replaced with U+FFFD
    Ascii,
}

impl TextEncoding {
    /// Resolves an encoding name, ignoring case
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Some(Self::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" | "binary" => Some(Self::Latin1),
            "ascii" | "us-ascii" => Some(Self::Ascii),
            _ => None,
        }
    }
}

const DEFAULT_IGNORED_DIRECTORIES: &[&str] = &["node_modules/**", ".git/**", ".hg/**"];

const DEFAULT_FILE_PATTERNS: &[&str] = &[
    "**/*.js",
    "Makefile",
    "**/*.sh",
    "**/*.html",
    "**/*.css",
    "**/*.json",
    "**/*.md",
    "**/*.txt",
    "**/*.yaml",
    "**/*.xml",
    "**/*.yml",
    "**/*.scss",
    "**/*.less",
    "**/*.php",
    "**/*.java",
    "**/*.py",
    "**/*.rb",
    "**/*.cpp",
    "**/*.cs",
    "**/*.swift",
    "**/*.rs",
    "**/*.go",
    "**/*.h",
    "**/*.hpp",
    "**/*.ts",
    "**/*.jsx",
    "**/*.tsx",
    "**/*.vue",
    "**/*.pl",
    "**/*.lua",
    "**/*.groovy",
    "**/*.scala",
    "**/*.kt",
    "**/*.dart",
];

fn default_concurrency() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("."),
            ignored_directories: to_strings(DEFAULT_IGNORED_DIRECTORIES),
            file_patterns: to_strings(DEFAULT_FILE_PATTERNS),
            file_encoding: "utf8".to_string(),
            line_length_limit: 1000,
            skip: Vec::new(),
            concurrency: default_concurrency(),
            case_sensitive: false,
            strict_comment_styles: false,
            ordered_output: true,
            color: true,
            format: OutputFormat::Text,
            log_level: default_log_level(),
        }
    }
}

impl ScanConfig {
    /// Loads configuration, layering `config_path` over the default locations
    pub fn load_from(config_path: Option<&Path>) -> ScanResult<Self> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ScanError::config_error(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
        }

        let mut builder = ConfigBuilder::builder();

        let config_files = [
            // Global config
            dirs::config_dir().map(|p| p.join("fixme/config.yaml")),
            // Local config
            Some(PathBuf::from(".fixme.yaml")),
            // Custom config
            config_path.map(PathBuf::from),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                debug!("Loading configuration from {}", path.display());
                builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Yaml));
            }
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Applies command-line values over configuration file values
    pub fn merge_with_cli(mut self, cli: ScanOverrides) -> Self {
        if let Some(root_path) = cli.root_path {
            self.root_path = root_path;
        }
        if !cli.ignored_directories.is_empty() {
            self.ignored_directories = cli.ignored_directories;
        }
        if !cli.file_patterns.is_empty() {
            self.file_patterns = cli.file_patterns;
        }
        if let Some(encoding) = cli.file_encoding {
            self.file_encoding = encoding;
        }
        if let Some(limit) = cli.line_length_limit {
            self.line_length_limit = limit;
        }
        if !cli.skip.is_empty() {
            self.skip = cli.skip;
        }
        if let Some(concurrency) = cli.concurrency {
            self.concurrency = concurrency;
        }
        if cli.case_sensitive {
            self.case_sensitive = true;
        }
        if cli.strict_comment_styles {
            self.strict_comment_styles = true;
        }
        if cli.unordered_output {
            self.ordered_output = false;
        }
        if cli.no_color {
            self.color = false;
        }
        if let Some(format) = cli.format {
            self.format = format;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        self
    }

    /// The configured encoding; unknown names fall back to UTF-8
    pub fn encoding(&self) -> TextEncoding {
        TextEncoding::from_name(&self.file_encoding).unwrap_or_else(|| {
            warn!(
                "Unknown file encoding '{}', falling back to utf8",
                self.file_encoding
            );
            TextEncoding::Utf8
        })
    }

    /// Renders the effective configuration as YAML
    pub fn to_yaml(&self) -> ScanResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Values supplied on the command line. Unset fields leave the loaded
/// configuration untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOverrides {
    pub root_path: Option<PathBuf>,
    pub ignored_directories: Vec<String>,
    pub file_patterns: Vec<String>,
    pub file_encoding: Option<String>,
    pub line_length_limit: Option<usize>,
    pub skip: Vec<String>,
    pub concurrency: Option<NonZeroUsize>,
    pub case_sensitive: bool,
    pub strict_comment_styles: bool,
    pub unordered_output: bool,
    pub no_color: bool,
    pub format: Option<OutputFormat>,
    pub log_level: Option<String>,
}
