//! Failure taxonomy for namespace operations.

use std::io;

use protocol::ErrorCode;
use thiserror::Error;

/// Errors that can occur while resolving paths or touching storage.
///
/// Paths carried by the variants are client-relative (`/` is the root), so
/// messages can be returned to clients without exposing the server layout.
#[derive(Debug, Error)]
pub enum FsError {
    /// The path escapes the root, or the root itself was targeted.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The path does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The destination already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A directory was required.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// A file was required.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// A supplied name is empty or not a single path segment.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// The move cannot be performed (e.g. a directory into itself).
    #[error("invalid move: {0}")]
    InvalidMove(String),

    /// Any other error reported by storage.
    #[error("storage failure at {path}: {source}")]
    Storage {
        /// Client-relative path involved.
        path: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl FsError {
    /// Map an I/O error onto the taxonomy.
    pub fn from_io(err: io::Error, path: impl Into<String>) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => FsError::NotFound(path),
            io::ErrorKind::AlreadyExists => FsError::AlreadyExists(path),
            io::ErrorKind::NotADirectory => FsError::NotADirectory(path),
            io::ErrorKind::IsADirectory => FsError::IsADirectory(path),
            _ => FsError::Storage { path, source: err },
        }
    }

    /// Protocol error code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            FsError::Forbidden(_) => ErrorCode::Forbidden,
            FsError::NotFound(_) => ErrorCode::NotFound,
            FsError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            FsError::NotADirectory(_) => ErrorCode::NotADirectory,
            FsError::IsADirectory(_) => ErrorCode::IsADirectory,
            FsError::InvalidName(_) | FsError::InvalidMove(_) => ErrorCode::InvalidRequest,
            FsError::Storage { .. } => ErrorCode::StorageFailure,
        }
    }

    /// Only opaque storage failures are worth retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FsError::Storage { .. })
    }
}
