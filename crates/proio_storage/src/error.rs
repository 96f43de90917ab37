//! Error types for stream operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for stream operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while opening or driving a byte stream.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A file could not be opened or created.
    #[error("cannot open {}: {source}", .path.display())]
    FileOpen {
        /// The path that failed.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },

    /// The stream cannot be repositioned.
    #[error("stream is not seekable")]
    NotSeekable,
}

impl StorageError {
    /// Create a file open error.
    pub fn file_open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileOpen {
            path: path.into(),
            source,
        }
    }
}
