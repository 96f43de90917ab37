//! # proio core
//!
//! Event containers and the bucketed stream format.
//!
//! This crate provides:
//! - [`Event`]: typed entries addressed by id, a tag index, a per-event
//!   type table, and a pool of reusable entry objects
//! - [`Bucket`] and [`BucketHeader`]: batches of length-prefixed events
//!   and the record describing them on the wire
//! - [`Writer`]: accumulates events into buckets, compresses them, and
//!   writes frames from a background thread
//! - [`Reader`]: finds frames, decompresses buckets on demand, and
//!   materializes events, with skipping and rewinding
//!
//! ## Example
//!
//! ```ignore
//! use proio_core::{Event, Reader, Writer};
//!
//! let writer = Writer::create("out.proio")?;
//! let mut event = Event::new();
//! event.add_entry("MCParticles", Box::new(particle));
//! writer.push(&mut event)?;
//! writer.close()?;
//!
//! let mut reader = Reader::open("out.proio")?.with_registry(registry);
//! while let Some(mut event) = reader.next_event()? {
//!     for id in event.tagged_entries("MCParticles") {
//!         println!("{:?}", event.get_entry(id)?);
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod bucket;
mod config;
mod error;
pub mod event;
pub mod stream;

pub use bucket::{Bucket, BucketHeader, Compression};
pub use config::{ReaderConfig, WriterConfig, DEFAULT_BUCKET_DUMP_THRESHOLD};
pub use error::{CoreError, CoreResult};
pub use event::Event;
pub use stream::{Events, Reader, Writer, MAGIC_BYTES};

pub use proio_codec::{Entry, EntryRegistry, EntryType};
