//! Bucket compression and decompression.
//!
//! Both directions write into a caller-owned buffer so that the writer and
//! reader can keep reusing the same allocations bucket after bucket.

use super::Compression;
use crate::error::{CoreError, CoreResult};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use lz4_flex::frame::{FrameDecoder, FrameEncoder, FrameInfo};
use std::io::{Read, Write};

const LZ4_FRAME_MAGIC: u32 = 0x184D_2204;
const LZ4_FLAG_CONTENT_SIZE: u8 = 0x08;

/// Compresses `data` into `out`, replacing its contents.
///
/// `Compression::None` copies; callers that can swap buffers instead
/// should do so.
pub fn compress_into(data: &[u8], kind: Compression, out: &mut Vec<u8>) -> CoreResult<()> {
    out.clear();
    match kind {
        Compression::None => out.extend_from_slice(data),
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(&mut *out, flate2::Compression::default());
            encoder.write_all(data)?;
            encoder.finish()?;
        }
        Compression::Lz4 => {
            let info = FrameInfo::new().content_size(Some(data.len() as u64));
            let mut encoder = FrameEncoder::with_frame_info(info, &mut *out);
            encoder.write_all(data)?;
            encoder
                .finish()
                .map_err(|e| CoreError::serialization(format!("lz4 frame: {e}")))?;
        }
    }
    Ok(())
}

/// Decompresses `data` into `out`, replacing its contents.
///
/// Output longer than `limit` bytes is reported as a corrupt bucket.
pub fn decompress_into(
    data: &[u8],
    kind: Compression,
    out: &mut Vec<u8>,
    limit: u64,
) -> CoreResult<()> {
    out.clear();
    match kind {
        Compression::None => out.extend_from_slice(data),
        Compression::Gzip => {
            read_bounded(GzDecoder::new(data), out, limit)
                .map_err(|e| CoreError::bad_frame(format!("gzip: {e}")))?;
        }
        Compression::Lz4 => {
            if let Some(size) = lz4_content_size(data).filter(|size| *size > 0) {
                out.reserve(usize::try_from(size.min(limit)).unwrap_or(0));
            }
            read_bounded(FrameDecoder::new(data), out, limit)
                .map_err(|e| CoreError::bad_frame(format!("lz4: {e}")))?;
        }
    }
    if out.len() as u64 > limit {
        return Err(CoreError::corrupt_bucket(format!(
            "decompressed bucket exceeds {limit} bytes"
        )));
    }
    Ok(())
}

// Reads at most one byte past the limit so overflow is detectable.
fn read_bounded(reader: impl Read, out: &mut Vec<u8>, limit: u64) -> std::io::Result<usize> {
    reader.take(limit.saturating_add(1)).read_to_end(out)
}

/// Content size declared in an LZ4 frame header, if present.
pub fn lz4_content_size(frame: &[u8]) -> Option<u64> {
    let magic = u32::from_le_bytes(frame.get(0..4)?.try_into().ok()?);
    if magic != LZ4_FRAME_MAGIC {
        return None;
    }
    let flags = *frame.get(4)?;
    if flags & LZ4_FLAG_CONTENT_SIZE == 0 {
        return None;
    }
    Some(u64::from_le_bytes(frame.get(6..14)?.try_into().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        b"MCParticles TrackerHits "
            .iter()
            .copied()
            .cycle()
            .take(10_000)
            .collect()
    }

    #[test]
    fn every_kind_restores_input() {
        let data = sample();
        for kind in [Compression::None, Compression::Gzip, Compression::Lz4] {
            let mut packed = Vec::new();
            compress_into(&data, kind, &mut packed).unwrap();
            if kind != Compression::None {
                assert!(packed.len() < data.len(), "{kind} did not shrink input");
            }

            let mut unpacked = vec![0xAA; 3];
            decompress_into(&packed, kind, &mut unpacked, u64::MAX).unwrap();
            assert_eq!(unpacked, data);
        }
    }

    #[test]
    fn lz4_frame_declares_size() {
        let data = sample();
        let mut packed = Vec::new();
        compress_into(&data, Compression::Lz4, &mut packed).unwrap();
        assert_eq!(lz4_content_size(&packed), Some(data.len() as u64));
        assert_eq!(lz4_content_size(b"not a frame at all"), None);
    }

    #[test]
    fn garbage_is_a_bad_frame() {
        let mut out = Vec::new();
        let err = decompress_into(b"garbage bytes", Compression::Lz4, &mut out, u64::MAX)
            .unwrap_err();
        assert!(matches!(err, CoreError::BadCompressionFrame { .. }));

        let err = decompress_into(b"garbage bytes", Compression::Gzip, &mut out, u64::MAX)
            .unwrap_err();
        assert!(matches!(err, CoreError::BadCompressionFrame { .. }));
    }

    #[test]
    fn limit_enforced() {
        let data = sample();
        let mut packed = Vec::new();
        compress_into(&data, Compression::Gzip, &mut packed).unwrap();
        let mut out = Vec::new();
        let err = decompress_into(&packed, Compression::Gzip, &mut out, 100).unwrap_err();
        assert!(matches!(err, CoreError::CorruptBucket { .. }));
    }
}
