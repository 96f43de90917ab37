//! Background thread that frames and writes buckets.

use super::MAGIC_BYTES;
use crate::error::{CoreError, CoreResult};
use proio_storage::OutputStream;
use std::io::Write;
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
use std::thread::{self, JoinHandle};
use tracing::trace;

/// One frame to write.
pub(crate) struct WriteJob {
    pub(crate) header: Vec<u8>,
    pub(crate) bucket: Vec<u8>,
}

/// A finished job, handing the bucket buffer back for reuse.
pub(crate) struct JobDone {
    pub(crate) bucket: Vec<u8>,
    pub(crate) result: CoreResult<()>,
}

/// Owns the output stream on a dedicated thread.
///
/// Jobs go through a rendezvous channel: a send completes only when the
/// thread is idle and takes the job, so at most one frame is in flight.
pub(crate) struct WriteWorker {
    jobs: Option<SyncSender<WriteJob>>,
    done: Receiver<JobDone>,
    handle: Option<JoinHandle<CoreResult<()>>>,
}

impl WriteWorker {
    pub(crate) fn spawn(stream: Box<dyn OutputStream>) -> CoreResult<Self> {
        let (job_tx, job_rx) = mpsc::sync_channel(0);
        let (done_tx, done_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("proio-writer".into())
            .spawn(move || run(stream, job_rx, done_tx))?;
        Ok(Self {
            jobs: Some(job_tx),
            done: done_rx,
            handle: Some(handle),
        })
    }

    /// Blocks until the thread is ready, then hands over `job`.
    pub(crate) fn submit(&self, job: WriteJob) -> CoreResult<()> {
        let jobs = self.jobs.as_ref().ok_or(CoreError::WriterClosed)?;
        jobs.send(job).map_err(|_| CoreError::WriterClosed)
    }

    /// Collects finished jobs without blocking. Returns their buffers and
    /// the first error any of them reported.
    pub(crate) fn reclaim(&self, buffers: &mut Vec<Vec<u8>>) -> CoreResult<()> {
        let mut first_err = None;
        loop {
            match self.done.try_recv() {
                Ok(done) => {
                    buffers.push(done.bucket);
                    if let Err(e) = done.result {
                        first_err.get_or_insert(e);
                    }
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Stops accepting jobs, waits for the last write, and syncs.
    ///
    /// Calling it again is a no-op.
    pub(crate) fn finish(&mut self) -> CoreResult<()> {
        drop(self.jobs.take());
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let joined = handle.join().map_err(|_| CoreError::WriterClosed);
        let mut buffers = Vec::new();
        let reported = self.reclaim(&mut buffers);
        reported.and(joined?)
    }
}

fn run(
    mut stream: Box<dyn OutputStream>,
    jobs: Receiver<WriteJob>,
    done: mpsc::Sender<JobDone>,
) -> CoreResult<()> {
    let mut failed = false;
    for job in jobs {
        let result = if failed {
            Err(CoreError::WriterClosed)
        } else {
            write_frame(stream.as_mut(), &job)
        };
        failed |= result.is_err();
        trace!(
            header = job.header.len(),
            bucket = job.bucket.len(),
            ok = result.is_ok(),
            "write job"
        );
        if done
            .send(JobDone {
                bucket: job.bucket,
                result,
            })
            .is_err()
        {
            break;
        }
    }
    if failed {
        return Ok(());
    }
    stream.sync()?;
    Ok(())
}

fn write_frame(stream: &mut dyn OutputStream, job: &WriteJob) -> CoreResult<()> {
    let header_len = u32::try_from(job.header.len())
        .map_err(|_| CoreError::serialization("bucket header exceeds u32"))?;
    stream.write_all(&MAGIC_BYTES)?;
    stream.write_all(&header_len.to_le_bytes())?;
    stream.write_all(&job.header)?;
    stream.write_all(&job.bucket)?;
    stream.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proio_storage::MemoryBuffer;
    use std::io;

    #[test]
    fn frames_are_written_in_order() {
        let buffer = MemoryBuffer::new();
        let mut worker = WriteWorker::spawn(Box::new(buffer.writer())).unwrap();
        for n in 1..=3u8 {
            worker
                .submit(WriteJob {
                    header: vec![n],
                    bucket: vec![n; n as usize],
                })
                .unwrap();
        }
        worker.finish().unwrap();

        let data = buffer.data();
        let mut expected = Vec::new();
        for n in 1..=3u8 {
            expected.extend_from_slice(&MAGIC_BYTES);
            expected.extend_from_slice(&1u32.to_le_bytes());
            expected.push(n);
            expected.extend(std::iter::repeat(n).take(n as usize));
        }
        assert_eq!(data, expected);
    }

    #[test]
    fn buffers_come_back() {
        let buffer = MemoryBuffer::new();
        let mut worker = WriteWorker::spawn(Box::new(buffer.writer())).unwrap();
        worker
            .submit(WriteJob {
                header: vec![0],
                bucket: Vec::with_capacity(64),
            })
            .unwrap();
        // the second send waits for the first job to finish
        worker
            .submit(WriteJob {
                header: vec![0],
                bucket: Vec::new(),
            })
            .unwrap();
        let mut buffers = Vec::new();
        worker.reclaim(&mut buffers).unwrap();
        assert!(buffers.iter().any(|b| b.capacity() >= 64));
        worker.finish().unwrap();
        worker.finish().unwrap();
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl OutputStream for Broken {}

    #[test]
    fn write_errors_surface_on_finish() {
        let mut worker = WriteWorker::spawn(Box::new(Broken)).unwrap();
        worker
            .submit(WriteJob {
                header: vec![0],
                bucket: vec![1],
            })
            .unwrap();
        assert!(matches!(worker.finish(), Err(CoreError::Io(_))));
        assert!(matches!(
            worker.submit(WriteJob {
                header: Vec::new(),
                bucket: Vec::new()
            }),
            Err(CoreError::WriterClosed)
        ));
    }
}
