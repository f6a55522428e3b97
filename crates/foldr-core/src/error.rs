//! Error types for `foldr-core`.
//!
//! All fallible operations in the core library return [`CoreResult<T>`],
//! which is an alias for `Result<T, CoreError>`.

use std::path::PathBuf;

/// Unified error type for all core operations.
///
/// Each variant captures just enough context for the caller to display
/// a meaningful message or take corrective action. Cancellation is always
/// reported as [`CoreError::Cancelled`] and never folded into another variant.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The target path does not exist.
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    /// The process lacks permission to access the path.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// A directory was expected but the path points to a file.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A file or directory name is invalid (empty, contains path separators, etc.).
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// The caller passed an argument the operation refuses to reinterpret.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Failed to parse a TOML configuration file.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// The operation was superseded or explicitly cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// An archive could not be opened or listed.
    #[error("archive error: {0}")]
    Archive(String),

    /// A search could not be completed.
    #[error("search error: {0}")]
    Search(String),

    /// A filesystem watcher could not be installed.
    #[error("watch error: {0}")]
    Watch(String),

    /// The location cannot be handled by any collection kind.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// An I/O error that doesn't fit a more specific variant.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Returns `true` for [`CoreError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CoreError::Cancelled)
    }

    /// Maps an I/O error on `path` to the most specific variant.
    pub fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => CoreError::NotFound(path.into()),
            std::io::ErrorKind::PermissionDenied => CoreError::PermissionDenied(path.into()),
            _ => CoreError::Io(err),
        }
    }
}

impl From<notify::Error> for CoreError {
    fn from(err: notify::Error) -> Self {
        CoreError::Watch(err.to_string())
    }
}

/// Convenience alias used throughout `foldr-core`.
pub type CoreResult<T> = Result<T, CoreError>;
