//! Typed error handling for csstrim.
//!
//! The variants mirror how far a failure reaches: `InvalidPattern`,
//! `FileAccess` and `Config` abort the whole run, while `Parse` and `Write`
//! only affect the stylesheet they belong to.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for csstrim operations.
#[derive(Error, Debug)]
pub enum CsstrimError {
    /// A safelist or blocklist pattern failed to compile.
    #[error("Invalid pattern `{pattern}` in {scope} list: {message}")]
    InvalidPattern {
        pattern: String,
        scope: String,
        message: String,
    },

    /// A content file or stylesheet could not be read (or a glob could not be walked).
    #[error("File access error at {path}: {message}")]
    FileAccess {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Malformed stylesheet syntax
    #[error("Parse error in {path} at {line}:{column}: {message}")]
    Parse {
        path: PathBuf,
        message: String,
        /// Line number (1-indexed)
        line: usize,
        /// Column number (1-indexed)
        column: usize,
    },

    /// Writing or renaming the pruned output failed. The original is untouched.
    #[error("Write error at {path}: {message}")]
    Write {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration file errors
    #[error("Config error at {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// Cache-related errors
    #[error("Cache error: {message}")]
    Cache { message: String },
}

impl CsstrimError {
    /// Create an invalid pattern error.
    pub fn invalid_pattern(
        pattern: impl Into<String>,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            scope: scope.into(),
            message: message.into(),
        }
    }

    /// Create a file access error from an I/O failure.
    pub fn file_access(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a file access error without an underlying I/O error.
    pub fn file_access_msg(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::FileAccess {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a parse error with line/column info.
    pub fn parse_at(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
            line,
            column,
        }
    }

    /// Create a write error.
    pub fn write(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a config error.
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Short name of the error kind, printed by the CLI.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPattern { .. } => "InvalidPatternError",
            Self::FileAccess { .. } => "FileAccessError",
            Self::Parse { .. } => "ParseError",
            Self::Write { .. } => "WriteError",
            Self::Config { .. } => "ConfigError",
            Self::Cache { .. } => "CacheError",
        }
    }

    /// Get the path associated with this error, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::FileAccess { path, .. } => Some(path),
            Self::Parse { path, .. } => Some(path),
            Self::Write { path, .. } => Some(path),
            Self::Config { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Convenience type alias for csstrim results.
pub type CsstrimResult<T> = Result<T, CsstrimError>;

/// Extension trait for converting std::io::Error with path context.
pub trait IoResultExt<T> {
    /// Tag a read failure as a fatal file access error.
    fn with_path(self, path: impl Into<PathBuf>) -> CsstrimResult<T>;

    /// Tag an output failure as a per-stylesheet write error.
    fn with_write_path(self, path: impl Into<PathBuf>) -> CsstrimResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> CsstrimResult<T> {
        self.map_err(|e| CsstrimError::file_access(path, e))
    }

    fn with_write_path(self, path: impl Into<PathBuf>) -> CsstrimResult<T> {
        self.map_err(|e| CsstrimError::write(path, e))
    }
}
