//! In-memory streams.

use crate::error::StorageResult;
use crate::stream::{InputStream, OutputStream};
use parking_lot::RwLock;
use std::io::{self, Read, Write};
use std::sync::Arc;

/// A growable byte buffer shared between writers and readers.
///
/// Handles returned by [`writer`](Self::writer) append to the buffer;
/// handles returned by [`reader`](Self::reader) read it from the start
/// and see bytes appended later.
///
/// # Example
///
/// ```rust
/// use proio_storage::MemoryBuffer;
/// use std::io::{Read, Write};
///
/// let buffer = MemoryBuffer::new();
/// buffer.writer().write_all(b"frame").unwrap();
///
/// let mut out = Vec::new();
/// buffer.reader().read_to_end(&mut out).unwrap();
/// assert_eq!(out, b"frame");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBuffer {
    data: Arc<RwLock<Vec<u8>>>,
}

impl MemoryBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer holding `data`.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// A copy of the current contents.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Current length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// A seekable source positioned at the start.
    #[must_use]
    pub fn reader(&self) -> MemoryInput {
        MemoryInput {
            data: Arc::clone(&self.data),
            pos: 0,
        }
    }

    /// A sink that appends.
    #[must_use]
    pub fn writer(&self) -> MemoryOutput {
        MemoryOutput {
            data: Arc::clone(&self.data),
        }
    }
}

/// Reading handle for a [`MemoryBuffer`].
#[derive(Debug)]
pub struct MemoryInput {
    data: Arc<RwLock<Vec<u8>>>,
    pos: usize,
}

impl Read for MemoryInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.data.read();
        let available = data.get(self.pos..).unwrap_or_default();
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl InputStream for MemoryInput {
    fn skip(&mut self, n: u64) -> StorageResult<u64> {
        let remaining = self.data.read().len().saturating_sub(self.pos);
        let step = usize::try_from(n).unwrap_or(usize::MAX).min(remaining);
        self.pos += step;
        Ok(step as u64)
    }

    fn rewind(&mut self) -> StorageResult<()> {
        self.pos = 0;
        Ok(())
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

/// Appending handle for a [`MemoryBuffer`].
#[derive(Debug)]
pub struct MemoryOutput {
    data: Arc<RwLock<Vec<u8>>>,
}

impl Write for MemoryOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.write().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl OutputStream for MemoryOutput {}
