//! Reader and writer configuration.

use crate::bucket::Compression;

/// Uncompressed bucket size above which the writer flushes on its own.
pub const DEFAULT_BUCKET_DUMP_THRESHOLD: usize = 0x100_0000;

/// Configuration for a [`Writer`](crate::Writer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterConfig {
    /// Compression applied to each bucket.
    pub compression: Compression,

    /// Flush once the uncompressed bucket grows past this many bytes.
    pub bucket_dump_threshold: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            compression: Compression::Lz4,
            bucket_dump_threshold: DEFAULT_BUCKET_DUMP_THRESHOLD,
        }
    }
}

impl WriterConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bucket compression.
    #[must_use]
    pub const fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the bucket dump threshold in bytes.
    #[must_use]
    pub const fn bucket_dump_threshold(mut self, bytes: usize) -> Self {
        self.bucket_dump_threshold = bytes;
        self
    }
}

/// Configuration for a [`Reader`](crate::Reader).
///
/// The limits guard allocations against corrupt length fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Largest bucket header accepted.
    pub max_header_size: u32,

    /// Largest compressed or decompressed bucket accepted.
    pub max_bucket_size: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_header_size: 1024 * 1024,     // 1 MiB
            max_bucket_size: 1024 * 1024 * 1024, // 1 GiB
        }
    }
}

impl ReaderConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the header size limit.
    #[must_use]
    pub const fn max_header_size(mut self, bytes: u32) -> Self {
        self.max_header_size = bytes;
        self
    }

    /// Sets the bucket size limit.
    #[must_use]
    pub const fn max_bucket_size(mut self, bytes: u64) -> Self {
        self.max_bucket_size = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_defaults() {
        let config = WriterConfig::default();
        assert_eq!(config.compression, Compression::Lz4);
        assert_eq!(config.bucket_dump_threshold, 16 * 1024 * 1024);
    }

    #[test]
    fn builders_chain() {
        let config = WriterConfig::new()
            .compression(Compression::Gzip)
            .bucket_dump_threshold(512);
        assert_eq!(config.compression, Compression::Gzip);
        assert_eq!(config.bucket_dump_threshold, 512);

        let config = ReaderConfig::new().max_header_size(64).max_bucket_size(128);
        assert_eq!(config.max_header_size, 64);
        assert_eq!(config.max_bucket_size, 128);
    }
}
