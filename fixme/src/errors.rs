use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for scan operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors that can occur while scanning a tree for annotations.
///
/// Only [`ScanError::RootInaccessible`], configuration failures and
/// [`ScanError::Cancelled`] ever end a run. The per-file variants are caught
/// by the pipeline, logged, and only abort that one file.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Cannot access scan root {path}: {source}")]
    RootInaccessible {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] config::ConfigError),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
    #[error("Scan cancelled")]
    Cancelled,
}

/// Canonicalize the path and strip UNC prefixes so that
/// comparisons on Windows are consistent.
pub fn unify_path(original: &Path) -> PathBuf {
    let canonical = original
        .canonicalize()
        .unwrap_or_else(|_| original.to_path_buf());
    strip_unc_prefix(&canonical)
}

/// Strips the Windows UNC prefix (\\?\) from a path if present
fn strip_unc_prefix(p: &Path) -> PathBuf {
    let s = p.display().to_string();
    if let Some(stripped) = s.strip_prefix(r"\\?\") {
        PathBuf::from(stripped)
    } else {
        p.to_path_buf()
    }
}

impl ScanError {
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn root_inaccessible(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::RootInaccessible {
            path: path.into(),
            source,
        }
    }

    /// Maps an I/O error on `path` to the most specific variant.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::file_not_found(path),
            io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::IoError(err),
        }
    }

    /// Whether this error ends the whole run rather than a single file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::RootInaccessible { .. }
                | Self::ConfigError(_)
                | Self::ConfigFile(_)
                | Self::Cancelled
        )
    }
}
