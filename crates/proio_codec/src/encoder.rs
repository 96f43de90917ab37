//! Canonical CBOR encoder.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

const MAJOR_UNSIGNED: u8 = 0;
const MAJOR_NEGATIVE: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;

const SIMPLE_FALSE: u8 = 0xf4;
const SIMPLE_TRUE: u8 = 0xf5;
const SIMPLE_NULL: u8 = 0xf6;

/// Encode a value to canonical CBOR bytes.
///
/// Output is deterministic: integers and lengths take their shortest
/// form, map entries are written in ascending order of their encoded
/// keys, and nothing is indefinite-length.
///
/// # Errors
///
/// Returns an error if an integer is outside the CBOR range or a map
/// repeats a key.
pub fn to_canonical_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// A canonical CBOR encoder writing into an owned buffer.
#[derive(Debug, Default)]
pub struct CanonicalEncoder {
    out: Vec<u8>,
}

impl CanonicalEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an encoder that appends to an existing buffer.
    pub fn from_vec(out: Vec<u8>) -> Self {
        Self { out }
    }

    /// Encode one value, appending it to the buffer.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.out.push(SIMPLE_NULL),
            Value::Bool(b) => self.out.push(if *b { SIMPLE_TRUE } else { SIMPLE_FALSE }),
            Value::Integer(n) => self.put_integer(*n)?,
            Value::Bytes(b) => {
                self.put_head(MAJOR_BYTES, b.len() as u64);
                self.out.extend_from_slice(b);
            }
            Value::Text(s) => {
                self.put_head(MAJOR_TEXT, s.len() as u64);
                self.out.extend_from_slice(s.as_bytes());
            }
            Value::Array(items) => {
                self.put_head(MAJOR_ARRAY, items.len() as u64);
                for item in items {
                    self.encode(item)?;
                }
            }
            Value::Map(pairs) => self.put_map(pairs)?,
        }
        Ok(())
    }

    /// Consume the encoder and return the bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.out
    }

    /// The bytes encoded so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.out
    }

    fn put_integer(&mut self, n: i128) -> CodecResult<()> {
        if n >= 0 {
            let arg = u64::try_from(n).map_err(|_| CodecError::IntegerOverflow)?;
            self.put_head(MAJOR_UNSIGNED, arg);
        } else {
            let arg = u64::try_from(-1 - n).map_err(|_| CodecError::IntegerOverflow)?;
            self.put_head(MAJOR_NEGATIVE, arg);
        }
        Ok(())
    }

    /// Writes an initial byte plus the shortest big-endian argument.
    #[allow(clippy::cast_possible_truncation)]
    fn put_head(&mut self, major: u8, arg: u64) {
        let mt = major << 5;
        match arg {
            0..=23 => self.out.push(mt | arg as u8),
            24..=0xff => self.out.extend_from_slice(&[mt | 24, arg as u8]),
            0x100..=0xffff => {
                self.out.push(mt | 25);
                self.out.extend_from_slice(&(arg as u16).to_be_bytes());
            }
            0x1_0000..=0xffff_ffff => {
                self.out.push(mt | 26);
                self.out.extend_from_slice(&(arg as u32).to_be_bytes());
            }
            _ => {
                self.out.push(mt | 27);
                self.out.extend_from_slice(&arg.to_be_bytes());
            }
        }
    }

    fn put_map(&mut self, pairs: &[(Value, Value)]) -> CodecResult<()> {
        let mut keyed = Vec::with_capacity(pairs.len());
        for (k, v) in pairs {
            keyed.push((to_canonical_cbor(k)?, v));
        }
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        if keyed.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(CodecError::encoding_failed("duplicate map key"));
        }

        self.put_head(MAJOR_MAP, keyed.len() as u64);
        for (key, value) in keyed {
            self.out.extend_from_slice(&key);
            self.encode(value)?;
        }
        Ok(())
    }
}
