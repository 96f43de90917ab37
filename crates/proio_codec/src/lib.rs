//! # proio codec
//!
//! Message encoding for proio streams.
//!
//! Bucket headers and events are serialized as canonical CBOR maps so
//! that identical content always yields identical bytes:
//! - Integers and lengths use their shortest encoding
//! - Map entries are ordered by the bytes of their encoded keys
//! - No floats, tags, or indefinite-length items
//! - Decoding rejects anything left over after the top-level value
//!
//! The crate also defines [`Entry`], the interface typed event entries
//! implement, and [`EntryRegistry`], which maps type names back to
//! constructors when events are read.
//!
//! ## Usage
//!
//! ```
//! use proio_codec::{from_cbor, to_canonical_cbor, Value};
//!
//! let header = Value::map(vec![
//!     (Value::text("nevents"), Value::from(12u64)),
//!     (Value::text("comp"), Value::from(2u64)),
//! ]);
//! let bytes = to_canonical_cbor(&header).unwrap();
//! let decoded = from_cbor(&bytes).unwrap();
//! assert_eq!(decoded.u64_field("nevents").unwrap(), 12);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod entry;
mod error;
mod registry;
mod value;

pub use decoder::{from_cbor, CanonicalDecoder};
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use entry::{AsAny, Entry, EntryType};
pub use error::{CodecError, CodecResult};
pub use registry::EntryRegistry;
pub use value::Value;

/// Types that serialize to a CBOR [`Value`].
pub trait Encode {
    /// Build the value tree for this object.
    fn to_value(&self) -> CodecResult<Value>;

    /// Serialize to canonical bytes.
    fn to_cbor(&self) -> CodecResult<Vec<u8>> {
        to_canonical_cbor(&self.to_value()?)
    }
}

/// Types that can be rebuilt from a CBOR [`Value`].
pub trait Decode: Sized {
    /// Rebuild from a decoded value tree.
    fn from_value(value: &Value) -> CodecResult<Self>;

    /// Parse canonical bytes, rejecting trailing input.
    fn from_cbor(bytes: &[u8]) -> CodecResult<Self> {
        Self::from_value(&from_cbor(bytes)?)
    }
}
