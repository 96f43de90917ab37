//! The bucketed stream format.
//!
//! A stream is a sequence of frames:
//!
//! ```text
//! +-----------+-----------------+----------------------+---------------------------+
//! | magic[16] | header_len u32le| header (header_len)  | bucket (header.bucket_size)|
//! +-----------+-----------------+----------------------+---------------------------+
//! ```
//!
//! The header is a [`BucketHeader`](crate::BucketHeader) encoded as
//! canonical CBOR. The bucket holds length-prefixed events, compressed as
//! the header says. Readers that lose alignment scan forward for the next
//! magic sequence.

mod reader;
mod worker;
mod writer;

pub use reader::{Events, Reader};
pub use writer::Writer;

/// Length of the frame delimiter.
pub const MAGIC_LEN: usize = 16;

/// Frame delimiter preceding every bucket header.
pub const MAGIC_BYTES: [u8; MAGIC_LEN] = [
    0xe1, 0xc1, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];
