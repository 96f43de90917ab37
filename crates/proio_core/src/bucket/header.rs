//! Bucket header message.

use proio_codec::{CodecError, CodecResult, Decode, Encode, Value};
use std::collections::BTreeMap;
use std::fmt;

/// How a bucket's bytes are compressed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Compression {
    /// Stored as is.
    None,
    /// gzip (DEFLATE) stream.
    Gzip,
    /// LZ4 frame format.
    #[default]
    Lz4,
}

impl Compression {
    /// Wire code for this kind.
    pub const fn code(self) -> u64 {
        match self {
            Self::None => 0,
            Self::Gzip => 1,
            Self::Lz4 => 2,
        }
    }

    /// Parses a wire code.
    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Gzip),
            2 => Some(Self::Lz4),
            _ => None,
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Lz4 => "lz4",
        })
    }
}

/// The record preceding each bucket on the wire.
///
/// `metadata` holds only the keys whose values changed since the previous
/// header; readers merge it into their running map.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BucketHeader {
    /// Number of events in the bucket.
    pub event_count: u64,
    /// Size of the compressed bucket bytes that follow the header.
    pub bucket_size: u64,
    /// Compression of the bucket bytes.
    pub compression: Compression,
    /// Metadata changes taking effect at this bucket.
    pub metadata: BTreeMap<String, String>,
}

const KEY_EVENTS: &str = "nevents";
const KEY_SIZE: &str = "size";
const KEY_COMPRESSION: &str = "comp";
const KEY_METADATA: &str = "meta";

impl BucketHeader {
    /// An empty header with no metadata changes.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Encode for BucketHeader {
    fn to_value(&self) -> CodecResult<Value> {
        let mut pairs = vec![
            (Value::text(KEY_EVENTS), Value::from(self.event_count)),
            (Value::text(KEY_SIZE), Value::from(self.bucket_size)),
            (
                Value::text(KEY_COMPRESSION),
                Value::from(self.compression.code()),
            ),
        ];
        if !self.metadata.is_empty() {
            let meta = self
                .metadata
                .iter()
                .map(|(k, v)| (Value::text(k.as_str()), Value::text(v.as_str())))
                .collect();
            pairs.push((Value::text(KEY_METADATA), Value::map(meta)));
        }
        Ok(Value::map(pairs))
    }
}

impl Decode for BucketHeader {
    fn from_value(value: &Value) -> CodecResult<Self> {
        let code = value.u64_field(KEY_COMPRESSION)?;
        let compression = Compression::from_code(code).ok_or_else(|| {
            CodecError::invalid_structure(format!("unknown compression code {code}"))
        })?;

        let mut metadata = BTreeMap::new();
        if let Some(meta) = value.get(KEY_METADATA) {
            let pairs = meta
                .as_map()
                .ok_or_else(|| CodecError::invalid_structure("meta must be a map"))?;
            for (k, v) in pairs {
                match (k.as_text(), v.as_text()) {
                    (Some(k), Some(v)) => {
                        metadata.insert(k.to_string(), v.to_string());
                    }
                    _ => return Err(CodecError::invalid_structure("meta entries must be text")),
                }
            }
        }

        Ok(Self {
            event_count: value.u64_field(KEY_EVENTS)?,
            bucket_size: value.u64_field(KEY_SIZE)?,
            compression,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proio_codec::to_canonical_cbor;

    #[test]
    fn header_with_metadata() {
        let mut header = BucketHeader {
            event_count: 12,
            bucket_size: 4096,
            compression: Compression::Gzip,
            metadata: BTreeMap::new(),
        };
        header.metadata.insert("run".into(), "42".into());

        let bytes = header.to_cbor().unwrap();
        assert_eq!(BucketHeader::from_cbor(&bytes).unwrap(), header);
    }

    #[test]
    fn empty_metadata_is_omitted() {
        let header = BucketHeader::new();
        let value = header.to_value().unwrap();
        assert!(value.get("meta").is_none());
        assert_eq!(value.as_map().unwrap().len(), 3);
    }

    #[test]
    fn unknown_compression_rejected() {
        let value = Value::map(vec![
            (Value::text("nevents"), Value::from(1u64)),
            (Value::text("size"), Value::from(1u64)),
            (Value::text("comp"), Value::from(9u64)),
        ]);
        let bytes = to_canonical_cbor(&value).unwrap();
        assert!(BucketHeader::from_cbor(&bytes).is_err());
    }

    #[test]
    fn missing_count_rejected() {
        let value = Value::map(vec![
            (Value::text("size"), Value::from(1u64)),
            (Value::text("comp"), Value::from(0u64)),
        ]);
        let bytes = to_canonical_cbor(&value).unwrap();
        assert_eq!(
            BucketHeader::from_cbor(&bytes).unwrap_err(),
            CodecError::missing_field("nevents")
        );
    }

    #[test]
    fn compression_codes() {
        for kind in [Compression::None, Compression::Gzip, Compression::Lz4] {
            assert_eq!(Compression::from_code(kind.code()), Some(kind));
        }
        assert_eq!(Compression::from_code(3), None);
        assert_eq!(Compression::default(), Compression::Lz4);
    }
}
