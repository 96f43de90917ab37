//! Error types for proio core.

use proio_storage::StorageError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while building, writing, or reading events.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A stream could not be opened or created.
    #[error("cannot open {}: {source}", .path.display())]
    FileOpen {
        /// The path that failed.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },

    /// A structured payload failed to decode.
    #[error("deserialization failed: {message}")]
    Deserialization {
        /// Description of the failure.
        message: String,
    },

    /// Bucket framing or a length prefix is inconsistent.
    #[error("corrupt bucket: {message}")]
    CorruptBucket {
        /// Description of the corruption.
        message: String,
    },

    /// A gzip or LZ4 stream is invalid.
    #[error("bad compression frame: {message}")]
    BadCompressionFrame {
        /// Description of the failure.
        message: String,
    },

    /// The stream could not be repositioned.
    #[error("seek failed: {message}")]
    Seek {
        /// Description of the failure.
        message: String,
    },

    /// An entry's type cannot be resolved to a decoder.
    #[error("unknown entry type {type_id} ({type_name:?})")]
    UnknownType {
        /// The event-local type id.
        type_id: u64,
        /// The type name, if the id was present in the type table.
        type_name: Option<String>,
    },

    /// An entry or message failed to encode.
    #[error("serialization failed: {message}")]
    Serialization {
        /// Description of the failure.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The writer's background worker has stopped.
    #[error("writer is closed")]
    WriterClosed,
}

impl CoreError {
    /// Creates a deserialization error.
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization {
            message: message.into(),
        }
    }

    /// Creates a corrupt bucket error.
    pub fn corrupt_bucket(message: impl Into<String>) -> Self {
        Self::CorruptBucket {
            message: message.into(),
        }
    }

    /// Creates a bad compression frame error.
    pub fn bad_frame(message: impl Into<String>) -> Self {
        Self::BadCompressionFrame {
            message: message.into(),
        }
    }

    /// Creates a seek error.
    pub fn seek(message: impl Into<String>) -> Self {
        Self::Seek {
            message: message.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::FileOpen { path, source } => Self::FileOpen { path, source },
            StorageError::NotSeekable => Self::seek("stream is not seekable"),
            StorageError::Io(e) => Self::Io(e),
        }
    }
}
