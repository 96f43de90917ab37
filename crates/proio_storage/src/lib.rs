//! # proio storage
//!
//! Byte streams underneath proio readers and writers.
//!
//! Readers pull from an [`InputStream`]; writers push to an
//! [`OutputStream`]. Both are thin extensions of `std::io`:
//!
//! - [`InputStream::skip`] advances cheaply when the source can seek
//! - [`InputStream::rewind`] returns to byte zero, or reports
//!   [`StorageError::NotSeekable`]
//! - [`OutputStream::sync`] flushes and persists
//!
//! ## Implementations
//!
//! - [`FileInput`] / [`FileOutput`]: buffered files
//! - [`MemoryBuffer`]: shared in-memory bytes, for tests and pipelines
//! - [`PipeInput`] / [`PipeOutput`]: any `Read`/`Write`, forward only

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod pipe;
mod stream;

pub use error::{StorageError, StorageResult};
pub use file::{FileInput, FileOutput};
pub use memory::{MemoryBuffer, MemoryInput, MemoryOutput};
pub use pipe::{PipeInput, PipeOutput};
pub use stream::{InputStream, OutputStream};
