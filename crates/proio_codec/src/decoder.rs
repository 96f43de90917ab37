//! Canonical CBOR decoder.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Largest element count accepted for an array or map.
const MAX_CONTAINER_ELEMENTS: u64 = 16 * 1024 * 1024;

/// Largest byte or text string length accepted.
const MAX_STRING_LENGTH: u64 = 1024 * 1024 * 1024;

/// Decode exactly one value from `bytes`.
///
/// # Errors
///
/// Returns an error if the input is not canonical CBOR, contains
/// forbidden items, or has bytes left over after the value.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = CanonicalDecoder::new(bytes);
    let value = decoder.decode()?;
    decoder.finish()?;
    Ok(value)
}

/// A cursor over CBOR input that validates canonical form.
#[derive(Debug)]
pub struct CanonicalDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

/// Initial byte split into its major type and argument.
struct Head {
    major: u8,
    /// `None` for indefinite-length markers.
    arg: Option<u64>,
    info: u8,
}

impl<'a> CanonicalDecoder<'a> {
    /// Create a decoder positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Fails if any input is left unconsumed.
    pub fn finish(&self) -> CodecResult<()> {
        match self.remaining().len() {
            0 => Ok(()),
            count => Err(CodecError::TrailingBytes { count }),
        }
    }

    /// Decode the next value.
    pub fn decode(&mut self) -> CodecResult<Value> {
        let head = self.read_head()?;
        match head.major {
            0 => Ok(Value::Integer(i128::from(Self::definite(&head)?))),
            1 => Ok(Value::Integer(-1 - i128::from(Self::definite(&head)?))),
            2 => {
                let bytes = self.take_string(&head)?;
                Ok(Value::Bytes(bytes.to_vec()))
            }
            3 => {
                let bytes = self.take_string(&head)?;
                let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
                Ok(Value::Text(text.to_owned()))
            }
            4 => {
                let len = Self::container_len(&head)?;
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.decode()?);
                }
                Ok(Value::Array(items))
            }
            5 => self.decode_map(&head),
            6 => Err(CodecError::invalid_structure("tagged items are not supported")),
            _ => Self::simple(&head),
        }
    }

    fn take(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(CodecError::UnexpectedEof)?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_head(&mut self) -> CodecResult<Head> {
        let initial = self.take(1)?[0];
        let major = initial >> 5;
        let info = initial & 0x1f;

        // Floats and simple values live in major type 7 and are
        // interpreted by `simple`, not as lengths.
        if major == 7 {
            return Ok(Head {
                major,
                arg: None,
                info,
            });
        }

        let (arg, min) = match info {
            0..=23 => (u64::from(info), 0),
            24 => (u64::from(self.take(1)?[0]), 24),
            25 => {
                let b = self.take(2)?;
                (u64::from(u16::from_be_bytes([b[0], b[1]])), 0x100)
            }
            26 => {
                let b = self.take(4)?;
                (u64::from(u32::from_be_bytes([b[0], b[1], b[2], b[3]])), 0x1_0000)
            }
            27 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(self.take(8)?);
                (u64::from_be_bytes(buf), 0x1_0000_0000)
            }
            31 => {
                return Ok(Head {
                    major,
                    arg: None,
                    info,
                })
            }
            _ => return Err(CodecError::invalid_structure("reserved additional info")),
        };
        if arg < min {
            return Err(CodecError::invalid_structure(
                "non-canonical: argument not in shortest form",
            ));
        }
        Ok(Head {
            major,
            arg: Some(arg),
            info,
        })
    }

    fn definite(head: &Head) -> CodecResult<u64> {
        head.arg.ok_or(CodecError::IndefiniteLengthForbidden)
    }

    fn bounded(head: &Head, max_allowed: u64) -> CodecResult<usize> {
        let claimed = Self::definite(head)?;
        if claimed > max_allowed {
            return Err(CodecError::SizeLimitExceeded {
                claimed,
                max_allowed,
            });
        }
        usize::try_from(claimed).map_err(|_| CodecError::IntegerOverflow)
    }

    fn container_len(head: &Head) -> CodecResult<usize> {
        Self::bounded(head, MAX_CONTAINER_ELEMENTS)
    }

    fn take_string(&mut self, head: &Head) -> CodecResult<&'a [u8]> {
        let len = Self::bounded(head, MAX_STRING_LENGTH)?;
        self.take(len)
    }

    fn decode_map(&mut self, head: &Head) -> CodecResult<Value> {
        let len = Self::container_len(head)?;
        let mut pairs = Vec::with_capacity(len);
        let mut prev_key: Option<&'a [u8]> = None;

        for _ in 0..len {
            let start = self.pos;
            let key = self.decode()?;
            let key_bytes = &self.data[start..self.pos];
            if prev_key.is_some_and(|prev| prev >= key_bytes) {
                return Err(CodecError::invalid_structure(
                    "non-canonical: map keys not strictly ascending",
                ));
            }
            prev_key = Some(key_bytes);
            pairs.push((key, self.decode()?));
        }
        Ok(Value::Map(pairs))
    }

    fn simple(head: &Head) -> CodecResult<Value> {
        match head.info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            22 | 23 => Ok(Value::Null),
            25..=27 => Err(CodecError::FloatForbidden),
            31 => Err(CodecError::invalid_structure("break outside indefinite item")),
            other => Err(CodecError::invalid_structure(format!(
                "unsupported simple value {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::to_canonical_cbor;
    use proptest::prelude::*;

    #[test]
    fn decodes_integers() {
        assert_eq!(from_cbor(&[0x00]).unwrap(), Value::Integer(0));
        assert_eq!(from_cbor(&[0x18, 200]).unwrap(), Value::Integer(200));
        assert_eq!(from_cbor(&[0x20]).unwrap(), Value::Integer(-1));
        assert_eq!(
            from_cbor(&[0x3b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]).unwrap(),
            Value::Integer(-1 - i128::from(u64::MAX))
        );
    }

    #[test]
    fn rejects_long_form_integers() {
        assert!(matches!(
            from_cbor(&[0x18, 5]),
            Err(CodecError::InvalidStructure { .. })
        ));
        assert!(matches!(
            from_cbor(&[0x19, 0x00, 0x10]),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn rejects_trailing_bytes() {
        assert_eq!(
            from_cbor(&[0x01, 0x02, 0x03]),
            Err(CodecError::TrailingBytes { count: 2 })
        );
    }

    #[test]
    fn rejects_truncated_input() {
        assert_eq!(from_cbor(&[0x63, b'a']), Err(CodecError::UnexpectedEof));
        assert_eq!(from_cbor(&[]), Err(CodecError::UnexpectedEof));
    }

    #[test]
    fn rejects_floats_and_indefinite() {
        assert_eq!(
            from_cbor(&[0xf9, 0x3c, 0x00]),
            Err(CodecError::FloatForbidden)
        );
        assert_eq!(
            from_cbor(&[0x9f, 0x01, 0xff]),
            Err(CodecError::IndefiniteLengthForbidden)
        );
    }

    #[test]
    fn rejects_unsorted_map() {
        let bytes = [0xa2, 0x61, b'b', 0x01, 0x61, b'a', 0x02];
        assert!(matches!(
            from_cbor(&bytes),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn rejects_oversized_claims() {
        // byte string claiming 2^32 bytes
        let bytes = [0x5b, 0, 0, 0, 1, 0, 0, 0, 0];
        assert!(matches!(
            from_cbor(&bytes),
            Err(CodecError::SizeLimitExceeded { .. })
        ));
    }

    #[test]
    fn invalid_utf8() {
        assert_eq!(from_cbor(&[0x61, 0xff]), Err(CodecError::InvalidUtf8));
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            any::<u64>().prop_map(Value::from),
            prop::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
            "[a-z]{0,12}".prop_map(Value::Text),
        ];
        leaf.prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map(any::<u32>(), inner, 0..6).prop_map(|m| {
                    Value::map(m.into_iter().map(|(k, v)| (Value::from(k), v)).collect())
                }),
            ]
        })
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(value in arb_value()) {
            let bytes = to_canonical_cbor(&value).unwrap();
            prop_assert_eq!(from_cbor(&bytes).unwrap(), value);
        }
    }
}
