//! Fixture entry types and helpers.
//!
//! Quantities are fixed-point integers because the canonical encoding has
//! no floats: momenta in keV, energies in eV, positions in micrometres,
//! times in picoseconds, charge in thirds of the elementary charge.

use proio_codec::{CodecError, CodecResult, Decode, Encode, Entry, EntryRegistry, EntryType, Value};
use proio_core::{Compression, CoreResult, Event, Reader, Writer, WriterConfig};
use proio_storage::MemoryBuffer;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Implements [`Entry`] and [`EntryType`] for a type with CBOR
/// [`Encode`]/[`Decode`] impls.
macro_rules! cbor_entry {
    ($ty:ty, $name:expr) => {
        impl Entry for $ty {
            fn type_name(&self) -> &str {
                <Self as EntryType>::TYPE_NAME
            }

            fn encode(&self) -> CodecResult<Vec<u8>> {
                self.to_cbor()
            }

            fn merge_from(&mut self, bytes: &[u8]) -> CodecResult<()> {
                *self = <Self as Decode>::from_cbor(bytes)?;
                Ok(())
            }

            fn clear(&mut self) {
                *self = Self::default();
            }

            fn clone_entry(&self) -> Box<dyn Entry> {
                Box::new(self.clone())
            }
        }

        impl EntryType for $ty {
            const TYPE_NAME: &'static str = $name;
        }
    };
}

fn ids(value: &Value, key: &str) -> CodecResult<Vec<u64>> {
    value
        .field(key)?
        .as_array()
        .ok_or_else(|| CodecError::invalid_structure(format!("{key} must be an array")))?
        .iter()
        .map(|v| {
            v.as_u64()
                .ok_or_else(|| CodecError::invalid_structure(format!("{key} must hold ids")))
        })
        .collect()
}

fn triple(value: &Value, key: &str) -> CodecResult<[i64; 3]> {
    let items = value
        .field(key)?
        .as_array()
        .filter(|items| items.len() == 3)
        .ok_or_else(|| CodecError::invalid_structure(format!("{key} must have 3 elements")))?;
    let mut out = [0i64; 3];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = item
            .as_i64()
            .ok_or_else(|| CodecError::invalid_structure(format!("{key} must be integers")))?;
    }
    Ok(out)
}

fn id_array(ids: &[u64]) -> Value {
    Value::Array(ids.iter().map(|id| Value::from(*id)).collect())
}

fn triple_value(v: &[i64; 3]) -> Value {
    Value::Array(v.iter().map(|x| Value::from(*x)).collect())
}

/// A generated particle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Particle {
    /// PDG code.
    pub pdg: i64,
    /// Charge in units of e/3.
    pub charge: i32,
    /// Momentum in keV.
    pub momentum: [i64; 3],
    /// Entry ids of parent particles.
    pub parents: Vec<u64>,
    /// Entry ids of daughter particles.
    pub children: Vec<u64>,
}

impl Particle {
    /// An electron moving along +z.
    pub fn electron() -> Self {
        Self {
            pdg: 11,
            charge: -3,
            momentum: [0, 0, 10_000_000],
            ..Self::default()
        }
    }

    /// A positive pion with the given momentum.
    pub fn pion(momentum: [i64; 3]) -> Self {
        Self {
            pdg: 211,
            charge: 3,
            momentum,
            ..Self::default()
        }
    }
}

impl Encode for Particle {
    fn to_value(&self) -> CodecResult<Value> {
        Ok(Value::map(vec![
            (Value::text("pdg"), Value::from(self.pdg)),
            (Value::text("charge"), Value::from(self.charge)),
            (Value::text("p"), triple_value(&self.momentum)),
            (Value::text("parents"), id_array(&self.parents)),
            (Value::text("children"), id_array(&self.children)),
        ]))
    }
}

impl Decode for Particle {
    fn from_value(value: &Value) -> CodecResult<Self> {
        let charge = i32::try_from(value.i64_field("charge")?)
            .map_err(|_| CodecError::IntegerOverflow)?;
        Ok(Self {
            pdg: value.i64_field("pdg")?,
            charge,
            momentum: triple(value, "p")?,
            parents: ids(value, "parents")?,
            children: ids(value, "children")?,
        })
    }
}

cbor_entry!(Particle, "proio.model.eic.Particle");

/// An energy deposit in a tracking layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimTrackerHit {
    /// Detector cell identifier.
    pub cell_id: u64,
    /// Deposited energy in eV.
    pub edep: u64,
    /// Time in ps.
    pub time: i64,
    /// Position in µm.
    pub position: [i64; 3],
    /// Entry id of the particle that made the hit.
    pub particle: u64,
}

impl SimTrackerHit {
    /// A hit in `cell_id` made by `particle`.
    pub fn new(cell_id: u64, particle: u64) -> Self {
        Self {
            cell_id,
            edep: 1_500,
            time: 3_300,
            position: [12_000, -4_000, 250_000],
            particle,
        }
    }
}

impl Encode for SimTrackerHit {
    fn to_value(&self) -> CodecResult<Value> {
        Ok(Value::map(vec![
            (Value::text("cell"), Value::from(self.cell_id)),
            (Value::text("edep"), Value::from(self.edep)),
            (Value::text("time"), Value::from(self.time)),
            (Value::text("pos"), triple_value(&self.position)),
            (Value::text("particle"), Value::from(self.particle)),
        ]))
    }
}

impl Decode for SimTrackerHit {
    fn from_value(value: &Value) -> CodecResult<Self> {
        Ok(Self {
            cell_id: value.u64_field("cell")?,
            edep: value.u64_field("edep")?,
            time: value.i64_field("time")?,
            position: triple(value, "pos")?,
            particle: value.u64_field("particle")?,
        })
    }
}

cbor_entry!(SimTrackerHit, "proio.model.eic.SimTrackerHit");

/// A calorimeter cell reading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaloHit {
    /// Detector cell identifier.
    pub cell_id: u64,
    /// Energy in keV.
    pub energy: u64,
}

impl Encode for CaloHit {
    fn to_value(&self) -> CodecResult<Value> {
        Ok(Value::map(vec![
            (Value::text("cell"), Value::from(self.cell_id)),
            (Value::text("energy"), Value::from(self.energy)),
        ]))
    }
}

impl Decode for CaloHit {
    fn from_value(value: &Value) -> CodecResult<Self> {
        Ok(Self {
            cell_id: value.u64_field("cell")?,
            energy: value.u64_field("energy")?,
        })
    }
}

cbor_entry!(CaloHit, "proio.model.eic.CaloHit");

/// Registry with every fixture type.
pub fn registry() -> Arc<EntryRegistry> {
    Arc::new(
        EntryRegistry::new()
            .with::<Particle>()
            .with::<SimTrackerHit>()
            .with::<CaloHit>(),
    )
}

/// An event with two particles tagged `MCParticles` and two hits tagged
/// `TrackerHits`, numbered by `seed`.
pub fn detector_event(seed: u64) -> Event {
    let mut event = Event::with_registry(registry());
    let shift = i64::try_from(seed).unwrap_or(i64::MAX);
    let beam = event.add_entry("MCParticles", Box::new(Particle::electron()));
    let mut pion = Particle::pion([shift, 2 * shift, 1_000_000 + shift]);
    pion.parents.push(beam);
    let pion = event.add_entry("MCParticles", Box::new(pion));
    event.add_entry("TrackerHits", Box::new(SimTrackerHit::new(100 + seed, beam)));
    event.add_entry("TrackerHits", Box::new(SimTrackerHit::new(200 + seed, pion)));
    event
}

/// Writes `events` to a memory buffer, flushing after every `per_bucket`
/// events.
pub fn write_events(
    events: &mut [Event],
    compression: Compression,
    per_bucket: usize,
) -> CoreResult<MemoryBuffer> {
    let buffer = MemoryBuffer::new();
    let writer = Writer::with_config(
        buffer.writer(),
        WriterConfig::new().compression(compression),
    )?;
    for (i, event) in events.iter_mut().enumerate() {
        writer.push(event)?;
        if per_bucket > 0 && (i + 1) % per_bucket == 0 {
            writer.flush()?;
        }
    }
    writer.close()?;
    Ok(buffer)
}

/// A reader over `buffer` that knows the fixture types.
pub fn reader_for(buffer: &MemoryBuffer) -> Reader {
    Reader::new(buffer.reader()).with_registry(registry())
}

/// A temporary directory that is removed on drop, with a stream path in it.
pub struct TempStream {
    dir: TempDir,
}

impl TempStream {
    /// Creates a fresh temporary directory.
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    /// Path of the stream file inside the directory.
    pub fn path(&self) -> PathBuf {
        self.dir.path().join("events.proio")
    }
}
