//! Buckets: batches of length-prefixed events, the unit of compression.
//!
//! A decompressed bucket is a plain concatenation of records:
//!
//! ```text
//! +------------+--------------------+------------+-----
//! | len: u32le | event bytes (len)  | len: u32le | ...
//! +------------+--------------------+------------+-----
//! ```

mod compression;
mod header;

pub use compression::{compress_into, decompress_into, lz4_content_size};
pub use header::{BucketHeader, Compression};

use crate::error::{CoreError, CoreResult};
use bytes::{Buf, BufMut};

/// Size of the length prefix in front of each event record.
pub const RECORD_PREFIX_SIZE: usize = 4;

/// An append-only buffer of length-prefixed event records.
#[derive(Debug, Default, Clone)]
pub struct Bucket {
    buf: Vec<u8>,
}

impl Bucket {
    /// Creates an empty bucket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one record.
    pub fn push_record(&mut self, record: &[u8]) -> CoreResult<()> {
        let len = u32::try_from(record.len()).map_err(|_| {
            CoreError::serialization(format!("event of {} bytes exceeds u32", record.len()))
        })?;
        self.buf.reserve(RECORD_PREFIX_SIZE + record.len());
        self.buf.put_u32_le(len);
        self.buf.put_slice(record);
        Ok(())
    }

    /// Uncompressed size in bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing has been appended since the last reset.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The raw bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Truncates to zero length, keeping the allocation.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Exchanges contents with `other` without copying.
    pub fn swap_buffer(&mut self, other: &mut Vec<u8>) {
        std::mem::swap(&mut self.buf, other);
    }
}

/// Forward-only position within a decompressed bucket.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecordCursor {
    offset: usize,
}

impl RecordCursor {
    /// A cursor at the start of a bucket.
    pub const fn new() -> Self {
        Self { offset: 0 }
    }

    /// Byte offset of the next record.
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the next record and advances past it, or `None` at the end.
    pub fn next_record<'a>(&mut self, data: &'a [u8]) -> CoreResult<Option<&'a [u8]>> {
        let mut rest = data.get(self.offset..).unwrap_or_default();
        if rest.is_empty() {
            return Ok(None);
        }
        if rest.len() < RECORD_PREFIX_SIZE {
            return Err(CoreError::corrupt_bucket(format!(
                "truncated length prefix at offset {}",
                self.offset
            )));
        }
        let len = rest.get_u32_le() as usize;
        if rest.len() < len {
            return Err(CoreError::corrupt_bucket(format!(
                "record of {len} bytes at offset {} overruns bucket",
                self.offset
            )));
        }
        self.offset += RECORD_PREFIX_SIZE + len;
        Ok(Some(&rest[..len]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn records_come_back_in_order() {
        let mut bucket = Bucket::new();
        bucket.push_record(b"first").unwrap();
        bucket.push_record(b"").unwrap();
        bucket.push_record(b"third").unwrap();
        assert_eq!(bucket.len(), 3 * RECORD_PREFIX_SIZE + 10);

        let mut cursor = RecordCursor::new();
        let data = bucket.as_slice();
        assert_eq!(cursor.next_record(data).unwrap(), Some(&b"first"[..]));
        assert_eq!(cursor.next_record(data).unwrap(), Some(&b""[..]));
        assert_eq!(cursor.next_record(data).unwrap(), Some(&b"third"[..]));
        assert_eq!(cursor.next_record(data).unwrap(), None);
        assert_eq!(cursor.offset(), data.len());
    }

    #[test]
    fn prefix_is_little_endian() {
        let mut bucket = Bucket::new();
        bucket.push_record(&[7u8; 258]).unwrap();
        assert_eq!(&bucket.as_slice()[..4], &[2, 1, 0, 0]);
    }

    #[test]
    fn reset_keeps_capacity() {
        let mut bucket = Bucket::new();
        bucket.push_record(&[0u8; 1024]).unwrap();
        let mut spare = Vec::with_capacity(4096);
        bucket.swap_buffer(&mut spare);
        assert_eq!(spare.len(), 1028);
        assert!(bucket.is_empty());
        assert!(bucket.buf.capacity() >= 4096);

        bucket.push_record(b"x").unwrap();
        bucket.reset();
        assert!(bucket.is_empty());
        assert!(bucket.buf.capacity() >= 4096);
    }

    #[test]
    fn overrun_is_corrupt() {
        let mut data = Vec::new();
        data.extend_from_slice(&100u32.to_le_bytes());
        data.extend_from_slice(b"short");
        let mut cursor = RecordCursor::new();
        assert!(matches!(
            cursor.next_record(&data),
            Err(CoreError::CorruptBucket { .. })
        ));

        let mut cursor = RecordCursor::new();
        assert!(matches!(
            cursor.next_record(&[1, 0]),
            Err(CoreError::CorruptBucket { .. })
        ));
    }

    proptest! {
        #[test]
        fn cursor_yields_every_record(
            records in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..300), 0..20)
        ) {
            let mut bucket = Bucket::new();
            for record in &records {
                bucket.push_record(record).unwrap();
            }
            let mut cursor = RecordCursor::new();
            for record in &records {
                let read = cursor.next_record(bucket.as_slice()).unwrap();
                prop_assert_eq!(read, Some(record.as_slice()));
            }
            prop_assert_eq!(cursor.next_record(bucket.as_slice()).unwrap(), None);
        }
    }
}
