//! File-backed streams.

use crate::error::{StorageError, StorageResult};
use crate::stream::{InputStream, OutputStream};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A buffered file source.
///
/// On regular files, skipping repositions the file instead of reading and
/// never moves past the end of the file. Other descriptors (FIFOs, pipes,
/// character devices) are read forward only.
#[derive(Debug)]
pub struct FileInput {
    inner: BufReader<File>,
    path: Option<PathBuf>,
    regular: bool,
}

fn is_regular(file: &File) -> bool {
    file.metadata().map(|m| m.file_type().is_file()).unwrap_or(false)
}

impl FileInput {
    /// Opens the file at `path` for reading.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::FileOpen`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| StorageError::file_open(path, e))?;
        Ok(Self {
            regular: is_regular(&file),
            inner: BufReader::new(file),
            path: Some(path.to_path_buf()),
        })
    }

    /// Wraps an already open file, which may be a pipe or other
    /// descriptor.
    pub fn from_file(file: File) -> Self {
        Self {
            regular: is_regular(&file),
            inner: BufReader::new(file),
            path: None,
        }
    }

    /// The path this input was opened from, if known.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Read for FileInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl InputStream for FileInput {
    fn skip(&mut self, n: u64) -> StorageResult<u64> {
        if !self.regular {
            let mut limited = Read::take(&mut self.inner, n);
            return Ok(io::copy(&mut limited, &mut io::sink())?);
        }
        let len = self.inner.get_ref().metadata()?.len();
        let pos = self.inner.stream_position()?;
        let step = n.min(len.saturating_sub(pos));
        let offset = i64::try_from(step)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "skip too large"))?;
        self.inner.seek_relative(offset)?;
        Ok(step)
    }

    fn rewind(&mut self) -> StorageResult<()> {
        if !self.regular {
            return Err(StorageError::NotSeekable);
        }
        self.inner.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    fn is_seekable(&self) -> bool {
        self.regular
    }
}

/// A buffered file sink.
#[derive(Debug)]
pub struct FileOutput {
    inner: BufWriter<File>,
    path: Option<PathBuf>,
}

impl FileOutput {
    /// Creates (or truncates) the file at `path` for writing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::FileOpen`] if the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| StorageError::file_open(path, e))?;
        Ok(Self {
            inner: BufWriter::new(file),
            path: Some(path.to_path_buf()),
        })
    }

    /// Wraps an already open file. Writes go wherever its cursor is.
    pub fn from_file(file: File) -> Self {
        Self {
            inner: BufWriter::new(file),
            path: None,
        }
    }

    /// The path this output was created at, if known.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Write for FileOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl OutputStream for FileOutput {
    fn sync(&mut self) -> StorageResult<()> {
        self.inner.flush()?;
        self.inner.get_ref().sync_data()?;
        Ok(())
    }
}
