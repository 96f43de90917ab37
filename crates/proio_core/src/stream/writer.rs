//! Stream writer.

use super::worker::{WriteJob, WriteWorker};
use crate::bucket::{compress_into, Bucket, BucketHeader, Compression};
use crate::config::WriterConfig;
use crate::error::{CoreError, CoreResult};
use crate::event::Event;
use parking_lot::Mutex;
use proio_codec::Encode;
use proio_storage::{FileOutput, OutputStream};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, error};

/// Writes events into compressed, self-describing buckets.
///
/// Events accumulate in an in-memory bucket until it grows past the dump
/// threshold or [`flush`](Self::flush) is called. Flushing compresses the
/// bucket on the calling thread and hands the frame to a background thread
/// that owns the output stream, so the next bucket can be filled while
/// the previous one is written.
///
/// All methods take `&self`; a writer can be shared between threads.
///
/// # Example
///
/// ```ignore
/// let writer = Writer::create("run42.proio")?;
/// writer.push_metadata("run", "42")?;
/// for mut event in events {
///     writer.push(&mut event)?;
/// }
/// writer.close()?;
/// ```
pub struct Writer {
    state: Mutex<WriterState>,
}

struct WriterState {
    bucket: Bucket,
    n_events: u64,
    config: WriterConfig,
    /// Last value written for each metadata key.
    metadata: BTreeMap<String, String>,
    /// Header for the bucket being filled, holding its metadata changes.
    pending: BucketHeader,
    /// Buffers returned by the worker, reused as compression targets.
    spare: Vec<Vec<u8>>,
    worker: WriteWorker,
}

impl Writer {
    /// Creates (or truncates) a file and writes to it.
    pub fn create(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::new(FileOutput::create(path)?)
    }

    /// Writes to `stream` with the default configuration.
    pub fn new(stream: impl OutputStream + 'static) -> CoreResult<Self> {
        Self::with_config(stream, WriterConfig::default())
    }

    /// Writes to `stream` with `config`.
    pub fn with_config(stream: impl OutputStream + 'static, config: WriterConfig) -> CoreResult<Self> {
        let worker = WriteWorker::spawn(Box::new(stream))?;
        Ok(Self {
            state: Mutex::new(WriterState {
                bucket: Bucket::new(),
                n_events: 0,
                config,
                metadata: BTreeMap::new(),
                pending: BucketHeader::new(),
                spare: Vec::new(),
                worker,
            }),
        })
    }

    /// Current configuration.
    pub fn config(&self) -> WriterConfig {
        self.state.lock().config
    }

    /// Sets the compression used from the next flush on.
    pub fn set_compression(&self, compression: Compression) {
        self.state.lock().config.compression = compression;
    }

    /// Sets the bucket dump threshold used from the next push on.
    pub fn set_bucket_dump_threshold(&self, bytes: usize) {
        self.state.lock().config.bucket_dump_threshold = bytes;
    }

    /// Appends an event to the current bucket.
    ///
    /// Metadata keys whose values differ from what the stream last carried
    /// are emitted first, which starts a new bucket. The event's entry
    /// cache is flushed as part of serialization.
    pub fn push(&self, event: &mut Event) -> CoreResult<()> {
        let mut state = self.state.lock();

        let changed: Vec<(String, String)> = event
            .metadata()
            .iter()
            .filter(|(key, value)| state.metadata.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        for (key, value) in changed {
            state.push_metadata(key, value)?;
        }

        let bytes = event.to_bytes()?;
        state.bucket.push_record(&bytes)?;
        state.n_events += 1;

        if state.bucket.len() > state.config.bucket_dump_threshold {
            state.flush()?;
        }
        Ok(())
    }

    /// Records a metadata change for the stream.
    ///
    /// Buffered events are flushed first, so the change applies to every
    /// event pushed after this call and none before it.
    pub fn push_metadata(&self, key: impl Into<String>, value: impl Into<String>) -> CoreResult<()> {
        self.state.lock().push_metadata(key.into(), value.into())
    }

    /// Compresses the buffered events and hands them to the write thread.
    ///
    /// Does nothing when no events are buffered. Blocks until the previous
    /// bucket has been written.
    pub fn flush(&self) -> CoreResult<()> {
        self.state.lock().flush()
    }

    /// Flushes, waits for every pending write, and syncs the stream.
    ///
    /// Dropping a writer does the same but can only log failures.
    pub fn close(self) -> CoreResult<()> {
        let mut this = self;
        this.state.get_mut().shutdown()
    }
}

impl WriterState {
    fn push_metadata(&mut self, key: String, value: String) -> CoreResult<()> {
        self.flush()?;
        self.metadata.insert(key.clone(), value.clone());
        self.pending.metadata.insert(key, value);
        Ok(())
    }

    fn flush(&mut self) -> CoreResult<()> {
        if self.n_events == 0 {
            return Ok(());
        }
        self.worker.reclaim(&mut self.spare)?;

        let compression = self.config.compression;
        let raw_len = self.bucket.len();
        let mut out = self.spare.pop().unwrap_or_default();
        match compression {
            Compression::None => {
                out.clear();
                self.bucket.swap_buffer(&mut out);
            }
            kind => compress_into(self.bucket.as_slice(), kind, &mut out)?,
        }

        let mut header = std::mem::take(&mut self.pending);
        header.event_count = self.n_events;
        header.bucket_size = out.len() as u64;
        header.compression = compression;
        let header_bytes = header
            .to_cbor()
            .map_err(|e| CoreError::serialization(format!("bucket header: {e}")))?;

        debug!(
            events = self.n_events,
            raw = raw_len,
            compressed = out.len(),
            %compression,
            "flushing bucket"
        );

        self.bucket.reset();
        self.n_events = 0;
        self.worker.submit(WriteJob {
            header: header_bytes,
            bucket: out,
        })
    }

    fn shutdown(&mut self) -> CoreResult<()> {
        let flushed = self.flush();
        // whatever could not be flushed is dropped
        self.bucket.reset();
        self.n_events = 0;
        let finished = self.worker.finish();
        flushed.and(finished)
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        if let Err(e) = self.state.get_mut().shutdown() {
            error!(error = %e, "failed to close writer");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::tests::{registry, Note};
    use crate::stream::MAGIC_BYTES;
    use proio_codec::Decode;
    use proio_storage::MemoryBuffer;

    fn note_event(text: &str) -> Event {
        let mut event = Event::with_registry(registry());
        event.add_entry("notes", Box::new(Note::new(text)));
        event
    }

    /// Splits a stream into (header, bucket bytes) frames.
    fn frames(data: &[u8]) -> Vec<(BucketHeader, Vec<u8>)> {
        let mut out = Vec::new();
        let mut pos = 0;
        while pos < data.len() {
            assert_eq!(&data[pos..pos + 16], &MAGIC_BYTES);
            pos += 16;
            let len = u32::from_le_bytes(data[pos..pos + 4].try_into().unwrap()) as usize;
            pos += 4;
            let header = BucketHeader::from_cbor(&data[pos..pos + len]).unwrap();
            pos += len;
            let size = header.bucket_size as usize;
            out.push((header, data[pos..pos + size].to_vec()));
            pos += size;
        }
        out
    }

    #[test]
    fn flush_without_events_writes_nothing() {
        let buffer = MemoryBuffer::new();
        let writer = Writer::new(buffer.writer()).unwrap();
        writer.flush().unwrap();
        writer.close().unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn one_frame_per_flush() {
        let buffer = MemoryBuffer::new();
        let writer = Writer::with_config(
            buffer.writer(),
            WriterConfig::new().compression(Compression::None),
        )
        .unwrap();
        writer.push(&mut note_event("a")).unwrap();
        writer.push(&mut note_event("b")).unwrap();
        writer.flush().unwrap();
        writer.push(&mut note_event("c")).unwrap();
        writer.close().unwrap();

        let frames = frames(&buffer.data());
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].0.event_count, 2);
        assert_eq!(frames[1].0.event_count, 1);
        assert_eq!(frames[0].0.compression, Compression::None);
    }

    #[test]
    fn threshold_triggers_flush() {
        let buffer = MemoryBuffer::new();
        let writer = Writer::with_config(
            buffer.writer(),
            WriterConfig::new().bucket_dump_threshold(1),
        )
        .unwrap();
        for text in ["x", "y", "z"] {
            writer.push(&mut note_event(text)).unwrap();
        }
        writer.close().unwrap();

        let frames = frames(&buffer.data());
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|(h, _)| h.event_count == 1));
        assert!(frames.iter().all(|(h, _)| h.compression == Compression::Lz4));
    }

    #[test]
    fn metadata_changes_start_new_bucket() {
        let buffer = MemoryBuffer::new();
        let writer = Writer::new(buffer.writer()).unwrap();

        let mut first = note_event("1");
        first.metadata_mut().insert("run".into(), "1".into());
        writer.push(&mut first).unwrap();
        // unchanged metadata does not split the bucket
        let mut same = note_event("1b");
        same.metadata_mut().insert("run".into(), "1".into());
        writer.push(&mut same).unwrap();

        let mut second = note_event("2");
        second.metadata_mut().insert("run".into(), "2".into());
        writer.push(&mut second).unwrap();
        writer.close().unwrap();

        let frames = frames(&buffer.data());
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].0.metadata["run"], "1");
        assert_eq!(frames[0].0.event_count, 2);
        assert_eq!(frames[1].0.metadata["run"], "2");
    }

    #[test]
    fn set_compression_applies_to_next_bucket() {
        let buffer = MemoryBuffer::new();
        let writer = Writer::new(buffer.writer()).unwrap();
        writer.push(&mut note_event("a")).unwrap();
        writer.flush().unwrap();
        writer.set_compression(Compression::Gzip);
        assert_eq!(writer.config().compression, Compression::Gzip);
        writer.push(&mut note_event("b")).unwrap();
        drop(writer);

        let frames = frames(&buffer.data());
        assert_eq!(frames[0].0.compression, Compression::Lz4);
        assert_eq!(frames[1].0.compression, Compression::Gzip);
    }

    #[test]
    fn writer_is_shareable() {
        let buffer = MemoryBuffer::new();
        let writer = std::sync::Arc::new(Writer::new(buffer.writer()).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let writer = std::sync::Arc::clone(&writer);
                std::thread::spawn(move || {
                    for i in 0..10 {
                        writer.push(&mut note_event(&format!("{t}-{i}"))).unwrap();
                        if i % 3 == 0 {
                            writer.flush().unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let writer = std::sync::Arc::try_unwrap(writer).ok().unwrap();
        writer.close().unwrap();

        let total: u64 = frames(&buffer.data()).iter().map(|(h, _)| h.event_count).sum();
        assert_eq!(total, 40);
    }
}
