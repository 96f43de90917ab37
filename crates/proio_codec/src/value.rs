//! Dynamic CBOR value type.

use crate::encoder::to_canonical_cbor;
use crate::error::{CodecError, CodecResult};

/// A dynamic CBOR value.
///
/// Integers are held as `i128` so that the full unsigned (major type 0)
/// and negative (major type 1) CBOR ranges share one variant. Floats are
/// not representable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer in the range `-2^64 ..= 2^64 - 1`.
    Integer(i128),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Text string (UTF-8).
    Text(String),
    /// Array of values.
    Array(Vec<Value>),
    /// Map of key-value pairs, sorted by encoded key.
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Create a map value whose pairs are ordered by the bytes of their
    /// encoded keys.
    ///
    /// Keys that cannot be encoded sort last; the encoder reports them.
    pub fn map(pairs: Vec<(Value, Value)>) -> Self {
        let mut keyed: Vec<(Option<Vec<u8>>, (Value, Value))> = pairs
            .into_iter()
            .map(|pair| (to_canonical_cbor(&pair.0).ok(), pair))
            .collect();
        keyed.sort_by(|a, b| match (&a.0, &b.0) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        Value::Map(keyed.into_iter().map(|(_, pair)| pair).collect())
    }

    /// Shorthand for a text value.
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Returns true if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer, if this is one.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the integer as `u64` if it is one and fits.
    pub fn as_u64(&self) -> Option<u64> {
        self.as_integer().and_then(|n| u64::try_from(n).ok())
    }

    /// Returns the integer as `i64` if it is one and fits.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_integer().and_then(|n| i64::try_from(n).ok())
    }

    /// Returns the byte slice, if this is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the string, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the elements, if this is an array.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the pairs, if this is a map.
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Looks up a text key in a map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_text() == Some(key))
            .map(|(_, v)| v)
    }

    /// Looks up a required text key in a map value.
    pub fn field(&self, key: &str) -> CodecResult<&Value> {
        self.get(key).ok_or_else(|| CodecError::missing_field(key))
    }

    /// Looks up a required unsigned field.
    pub fn u64_field(&self, key: &str) -> CodecResult<u64> {
        self.field(key)?
            .as_u64()
            .ok_or_else(|| CodecError::invalid_structure(format!("{key} must be unsigned")))
    }

    /// Looks up a required signed field.
    pub fn i64_field(&self, key: &str) -> CodecResult<i64> {
        self.field(key)?
            .as_i64()
            .ok_or_else(|| CodecError::invalid_structure(format!("{key} must be an integer")))
    }

    /// Looks up a required text field.
    pub fn text_field(&self, key: &str) -> CodecResult<&str> {
        self.field(key)?
            .as_text()
            .ok_or_else(|| CodecError::invalid_structure(format!("{key} must be text")))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

macro_rules! integer_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Integer(i128::from(v))
            }
        })*
    };
}

integer_from!(u8, u16, u32, u64, i8, i16, i32, i64);

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Integer(v as i128)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_orders_short_keys_first() {
        let m = Value::map(vec![
            (Value::text("types"), Value::Integer(1)),
            (Value::text("tags"), Value::Integer(2)),
            (Value::Integer(10), Value::Integer(3)),
        ]);
        let keys: Vec<_> = m.as_map().unwrap().iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(
            keys,
            vec![Value::Integer(10), Value::text("tags"), Value::text("types")]
        );
    }

    #[test]
    fn integer_accessors_respect_range() {
        assert_eq!(Value::Integer(-1).as_u64(), None);
        assert_eq!(Value::Integer(-1).as_i64(), Some(-1));
        assert_eq!(Value::from(u64::MAX).as_u64(), Some(u64::MAX));
        assert_eq!(Value::from(u64::MAX).as_i64(), None);
    }

    #[test]
    fn field_lookup() {
        let m = Value::map(vec![
            (Value::text("nevents"), Value::from(3u64)),
            (Value::text("name"), Value::text("x")),
        ]);
        assert_eq!(m.u64_field("nevents").unwrap(), 3);
        assert_eq!(m.text_field("name").unwrap(), "x");
        assert!(matches!(
            m.field("missing"),
            Err(CodecError::MissingField { .. })
        ));
        assert!(m.u64_field("name").is_err());
    }
}
