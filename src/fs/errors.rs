//! Filesystem Error Types
//!
//! Structured errors returned by `FileSystem` implementations.
//! The caching layer never creates these; it hands back whatever the
//! underlying filesystem produced.

use std::io;
use std::path::{Path, PathBuf};

/// Filesystem error types
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("{op} '{}': {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("File '{}' is not valid UTF-8", .path.display())]
    InvalidUtf8 { path: PathBuf },

    #[error("Walking '{}': {message}", .path.display())]
    Walk { path: PathBuf, message: String },
}

impl FsError {
    /// Wrap an I/O error with the operation and path that caused it
    pub fn io(op: &'static str, path: &Path, source: io::Error) -> Self {
        FsError::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether this error means the path does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Result alias used across the filesystem layer
pub type FsResult<T> = Result<T, FsError>;
