//! # proio testkit
//!
//! Test utilities for proio.
//!
//! This crate provides:
//! - Fixture entry types modeled on detector simulation output
//! - Event builders and temporary stream helpers
//! - Property-based generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use proio_testkit::prelude::*;
//!
//! let mut event = Event::with_registry(registry());
//! event.add_entry("MCParticles", Box::new(Particle::electron()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use proio_core::{Compression, Event, Reader, Writer, WriterConfig};
}

pub use fixtures::*;
