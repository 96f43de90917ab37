//! Stream traits.

use crate::error::{StorageError, StorageResult};
use std::io::{self, Read, Write};

/// A byte source a reader pulls buckets from.
///
/// Every source can skip forward by reading and discarding. Sources
/// backed by something seekable override [`skip`](Self::skip) to
/// reposition instead, and support [`rewind`](Self::rewind).
pub trait InputStream: Read + Send {
    /// Advance past up to `n` bytes, returning how many were skipped.
    ///
    /// A return value below `n` means the stream ended first.
    fn skip(&mut self, n: u64) -> StorageResult<u64> {
        let mut limited = Read::take(&mut *self, n);
        Ok(io::copy(&mut limited, &mut io::sink())?)
    }

    /// Reposition to the first byte of the stream.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotSeekable`] for forward-only sources.
    fn rewind(&mut self) -> StorageResult<()> {
        Err(StorageError::NotSeekable)
    }

    /// Returns true if [`rewind`](Self::rewind) is supported.
    fn is_seekable(&self) -> bool {
        false
    }
}

/// A byte sink a writer appends frames to.
pub trait OutputStream: Write + Send {
    /// Flush buffered bytes and ask the OS to persist them.
    fn sync(&mut self) -> StorageResult<()> {
        self.flush()?;
        Ok(())
    }
}

impl<T: InputStream + ?Sized> InputStream for Box<T> {
    fn skip(&mut self, n: u64) -> StorageResult<u64> {
        (**self).skip(n)
    }

    fn rewind(&mut self) -> StorageResult<()> {
        (**self).rewind()
    }

    fn is_seekable(&self) -> bool {
        (**self).is_seekable()
    }
}

impl<T: OutputStream + ?Sized> OutputStream for Box<T> {
    fn sync(&mut self) -> StorageResult<()> {
        (**self).sync()
    }
}

impl OutputStream for Vec<u8> {}

impl OutputStream for io::Sink {}
