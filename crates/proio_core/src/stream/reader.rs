//! Stream reader.

use super::{MAGIC_BYTES, MAGIC_LEN};
use crate::bucket::{decompress_into, BucketHeader, Compression, RecordCursor, RECORD_PREFIX_SIZE};
use crate::config::ReaderConfig;
use crate::error::{CoreError, CoreResult};
use crate::event::Event;
use proio_codec::{Decode, EntryRegistry};
use proio_storage::{FileInput, InputStream};
use std::collections::BTreeMap;
use std::io::{self, Read};
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Reads events back from a bucketed stream.
///
/// The reader scans for frame delimiters, so it tolerates leading noise
/// and slack between frames. Once a delimiter is found, a malformed header
/// or bucket is an error.
///
/// Buckets are decompressed only when an event inside them is actually
/// read; skipping whole buckets moves past their bytes without touching
/// them.
pub struct Reader {
    stream: Box<dyn InputStream>,
    registry: Arc<EntryRegistry>,
    config: ReaderConfig,
    header: Option<BucketHeader>,
    /// The current header's bucket bytes are still unread on the stream.
    body_pending: bool,
    bucket: Vec<u8>,
    staging: Vec<u8>,
    bucket_loaded: bool,
    cursor: RecordCursor,
    /// Records decoded or stepped over in the loaded bucket.
    records_read: u64,
    /// Events logically consumed from the current bucket.
    bucket_index: u64,
    metadata: BTreeMap<String, String>,
}

impl Reader {
    /// Opens a file for reading.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        Ok(Self::new(FileInput::open(path)?))
    }

    /// Reads from `stream` with an empty entry registry.
    pub fn new(stream: impl InputStream + 'static) -> Self {
        Self {
            stream: Box::new(stream),
            registry: Arc::new(EntryRegistry::new()),
            config: ReaderConfig::default(),
            header: None,
            body_pending: false,
            bucket: Vec::new(),
            staging: Vec::new(),
            bucket_loaded: false,
            cursor: RecordCursor::new(),
            records_read: 0,
            bucket_index: 0,
            metadata: BTreeMap::new(),
        }
    }

    /// Decodes entries of events it returns through `registry`.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<EntryRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Replaces the size limits.
    #[must_use]
    pub fn with_config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Metadata in effect at the current position.
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Header of the current bucket, if one has been read.
    pub fn header(&self) -> Option<&BucketHeader> {
        self.header.as_ref()
    }

    /// Iterates over the remaining events.
    pub fn events(&mut self) -> Events<'_> {
        Events {
            reader: self,
            failed: false,
        }
    }

    /// Reads the next event into a new [`Event`]. `Ok(None)` at end of stream.
    pub fn next_event(&mut self) -> CoreResult<Option<Event>> {
        let mut event = Event::with_registry(Arc::clone(&self.registry));
        Ok(self.next_into(&mut event, false)?.then_some(event))
    }

    /// Reads the next event into `event`, reusing its allocations and pool.
    ///
    /// With `metadata_only`, the event body is skipped and `event` is left
    /// empty apart from the stream metadata. The event's registry is
    /// replaced by the reader's. Returns false at end of stream.
    pub fn next_into(&mut self, event: &mut Event, metadata_only: bool) -> CoreResult<bool> {
        if !self.advance()? {
            return Ok(false);
        }
        if metadata_only {
            self.bucket_index += 1;
            event.clear();
        } else {
            let range = self.read_from_bucket()?;
            event.load_bytes(&self.bucket[range])?;
        }
        event.set_registry(Arc::clone(&self.registry));
        event.set_metadata(self.metadata.clone());
        Ok(true)
    }

    /// Copies the next event's encoded bytes into `data` without decoding.
    /// Returns false at end of stream.
    pub fn next_raw(&mut self, data: &mut Vec<u8>) -> CoreResult<bool> {
        if !self.advance()? {
            return Ok(false);
        }
        let range = self.read_from_bucket()?;
        data.clear();
        data.extend_from_slice(&self.bucket[range]);
        Ok(true)
    }

    /// Moves to the next bucket header, abandoning the rest of the current
    /// bucket. The returned header's events are the next ones read.
    pub fn next_header(&mut self) -> CoreResult<Option<&BucketHeader>> {
        if self.read_header()? {
            Ok(self.header.as_ref())
        } else {
            Ok(None)
        }
    }

    /// Skips up to `n` events and returns how many were skipped.
    ///
    /// Whole buckets are skipped on the raw stream; a bucket is only
    /// decompressed if a later read lands inside it.
    pub fn skip(&mut self, n: u64) -> CoreResult<u64> {
        let mut skipped = 0;
        while skipped < n {
            if !self.advance()? {
                break;
            }
            let available = self.remaining_in_bucket();
            let step = available.min(n - skipped);
            self.bucket_index += step;
            skipped += step;
        }
        Ok(skipped)
    }

    /// Rewinds to the start of the stream and reads the first header.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Seek`] if the stream cannot rewind.
    pub fn seek_to_start(&mut self) -> CoreResult<()> {
        self.stream.rewind()?;
        self.header = None;
        self.body_pending = false;
        self.bucket_loaded = false;
        self.bucket_index = 0;
        self.records_read = 0;
        self.metadata.clear();
        debug!("rewound stream");
        self.read_header()?;
        Ok(())
    }

    fn remaining_in_bucket(&self) -> u64 {
        self.header
            .as_ref()
            .map_or(0, |h| h.event_count.saturating_sub(self.bucket_index))
    }

    /// Reads headers until the current bucket has an unread event.
    fn advance(&mut self) -> CoreResult<bool> {
        while self.remaining_in_bucket() == 0 {
            if !self.read_header()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn read_header(&mut self) -> CoreResult<bool> {
        if self.body_pending {
            if let Some(header) = &self.header {
                let size = header.bucket_size;
                let skipped = self.stream.skip(size)?;
                if skipped < size {
                    return Err(CoreError::corrupt_bucket(format!(
                        "stream ended {skipped} bytes into a {size} byte bucket"
                    )));
                }
            }
        }
        self.header = None;
        self.body_pending = false;
        self.bucket_loaded = false;
        self.bucket_index = 0;
        self.records_read = 0;
        self.cursor = RecordCursor::new();

        if !self.sync_to_magic()? {
            return Ok(false);
        }

        let mut len = [0u8; 4];
        read_full(&mut self.stream, &mut len, "header length")?;
        let len = u32::from_le_bytes(len);
        if len > self.config.max_header_size {
            return Err(CoreError::deserialization(format!(
                "header length {len} exceeds {}",
                self.config.max_header_size
            )));
        }

        let mut raw = vec![0u8; len as usize];
        read_full(&mut self.stream, &mut raw, "header")?;
        let header = BucketHeader::from_cbor(&raw)
            .map_err(|e| CoreError::deserialization(format!("bucket header: {e}")))?;
        if header.bucket_size > self.config.max_bucket_size {
            return Err(CoreError::corrupt_bucket(format!(
                "bucket size {} exceeds {}",
                header.bucket_size, self.config.max_bucket_size
            )));
        }

        debug!(
            events = header.event_count,
            size = header.bucket_size,
            compression = %header.compression,
            "read bucket header"
        );
        for (key, value) in &header.metadata {
            self.metadata.insert(key.clone(), value.clone());
        }
        self.header = Some(header);
        self.body_pending = true;
        Ok(true)
    }

    /// Consumes bytes up to and including the next magic sequence.
    /// Returns false if the stream ends first.
    fn sync_to_magic(&mut self) -> CoreResult<bool> {
        let mut window = [0u8; MAGIC_LEN];
        let mut filled = 0;
        let mut discarded = 0u64;
        loop {
            while filled < MAGIC_LEN {
                let n = read_some(&mut self.stream, &mut window[filled..])?;
                if n == 0 {
                    discarded += filled as u64;
                    if discarded > 0 {
                        warn!(discarded, "trailing bytes without a frame");
                    }
                    return Ok(false);
                }
                filled += n;
            }
            if window == MAGIC_BYTES {
                if discarded > 0 {
                    warn!(discarded, "resynchronized on frame delimiter");
                }
                return Ok(true);
            }
            // no match can start before the next occurrence of the first byte
            let shift = window[1..]
                .iter()
                .position(|b| *b == MAGIC_BYTES[0])
                .map_or(MAGIC_LEN, |p| p + 1);
            window.copy_within(shift.., 0);
            filled = MAGIC_LEN - shift;
            discarded += shift as u64;
        }
    }

    fn read_bucket(&mut self) -> CoreResult<()> {
        let Some(header) = &self.header else {
            return Err(CoreError::corrupt_bucket("no bucket header"));
        };
        if !self.body_pending {
            return Err(CoreError::corrupt_bucket("bucket body already consumed"));
        }
        let size = header.bucket_size;
        let compression = header.compression;

        self.staging.clear();
        Read::take(&mut self.stream, size).read_to_end(&mut self.staging)?;
        self.body_pending = false;
        if (self.staging.len() as u64) < size {
            return Err(CoreError::corrupt_bucket(format!(
                "stream ended {} bytes into a {size} byte bucket",
                self.staging.len()
            )));
        }

        match compression {
            Compression::None => std::mem::swap(&mut self.bucket, &mut self.staging),
            kind => decompress_into(&self.staging, kind, &mut self.bucket, self.config.max_bucket_size)?,
        }
        self.bucket_loaded = true;
        self.cursor = RecordCursor::new();
        self.records_read = 0;
        Ok(())
    }

    /// Returns the byte range of the event at `bucket_index` and advances
    /// past it, decompressing the bucket and stepping over earlier records
    /// as needed.
    fn read_from_bucket(&mut self) -> CoreResult<Range<usize>> {
        if !self.bucket_loaded {
            self.read_bucket()?;
        }
        while self.records_read < self.bucket_index {
            self.next_record_range()?;
        }
        let range = self.next_record_range()?;
        self.bucket_index += 1;
        Ok(range)
    }

    fn next_record_range(&mut self) -> CoreResult<Range<usize>> {
        let start = self.cursor.offset() + RECORD_PREFIX_SIZE;
        let record = self.cursor.next_record(&self.bucket)?.ok_or_else(|| {
            CoreError::corrupt_bucket("bucket holds fewer events than its header declares")
        })?;
        self.records_read += 1;
        Ok(start..start + record.len())
    }
}

/// Iterator over the remaining events of a [`Reader`].
///
/// An error is yielded once and ends the iteration.
pub struct Events<'a> {
    reader: &'a mut Reader,
    failed: bool,
}

impl Iterator for Events<'_> {
    type Item = CoreResult<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.reader.next_event().transpose();
        self.failed = matches!(item, Some(Err(_)));
        item
    }
}

fn read_some(stream: &mut dyn InputStream, buf: &mut [u8]) -> CoreResult<usize> {
    loop {
        match stream.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

fn read_full(stream: &mut Box<dyn InputStream>, buf: &mut [u8], what: &str) -> CoreResult<()> {
    stream.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => CoreError::deserialization(format!("truncated {what}")),
        _ => CoreError::Io(e),
    })
}
