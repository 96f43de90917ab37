//! Forward-only streams over arbitrary readers and writers.

use crate::stream::{InputStream, OutputStream};
use std::io::{self, Read, Write};

/// Wraps any reader (stdin, a socket, a decompressor) as a forward-only
/// source. Skipping reads and discards; rewinding fails.
#[derive(Debug)]
pub struct PipeInput<R> {
    inner: R,
}

impl<R: Read + Send> PipeInput<R> {
    /// Wraps `inner`.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Unwraps the reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl PipeInput<io::Stdin> {
    /// Standard input.
    pub fn stdin() -> Self {
        Self::new(io::stdin())
    }
}

impl<R: Read> Read for PipeInput<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> InputStream for PipeInput<R> {}

/// Wraps any writer as a sink.
#[derive(Debug)]
pub struct PipeOutput<W> {
    inner: W,
}

impl<W: Write + Send> PipeOutput<W> {
    /// Wraps `inner`.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Unwraps the writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl PipeOutput<io::Stdout> {
    /// Standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Write for PipeOutput<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write + Send> OutputStream for PipeOutput<W> {}
