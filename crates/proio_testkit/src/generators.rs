//! Property-based test generators using proptest.
//!
//! Provides strategies for generating fixture entries, tag names, and whole
//! events described as plain data so failures shrink to readable cases.

use crate::fixtures::{registry, CaloHit, Particle, SimTrackerHit};
use proio_codec::Entry;
use proio_core::{Compression, Event};
use proptest::prelude::*;

/// One fixture entry of any type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixtureEntry {
    /// A [`Particle`].
    Particle(Particle),
    /// A [`SimTrackerHit`].
    TrackerHit(SimTrackerHit),
    /// A [`CaloHit`].
    CaloHit(CaloHit),
}

impl FixtureEntry {
    /// Boxes the entry for insertion into an event.
    pub fn into_entry(self) -> Box<dyn Entry> {
        match self {
            Self::Particle(p) => Box::new(p),
            Self::TrackerHit(h) => Box::new(h),
            Self::CaloHit(h) => Box::new(h),
        }
    }
}

/// An event described as `(tag, entry)` pairs in insertion order.
#[derive(Debug, Clone)]
pub struct EventSpec {
    /// Entries with the tag each is added under.
    pub entries: Vec<(String, FixtureEntry)>,
}

impl EventSpec {
    /// Builds the event. Entry ids follow insertion order starting at 1.
    pub fn build(&self) -> Event {
        let mut event = Event::with_registry(registry());
        for (tag, entry) in &self.entries {
            event.add_entry(tag, entry.clone().into_entry());
        }
        event
    }
}

/// Strategy for generating tag names.
pub fn tag_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][A-Za-z]{0,11}").expect("Invalid regex")
}

/// Strategy for generating particles with references to earlier ids.
pub fn particle_strategy() -> impl Strategy<Value = Particle> {
    (
        prop_oneof![Just(11i64), Just(-11), Just(22), Just(211), Just(-211), Just(2212)],
        -3i32..=3,
        prop::array::uniform3(-10_000_000i64..10_000_000),
        prop::collection::vec(1u64..64, 0..3),
        prop::collection::vec(1u64..64, 0..3),
    )
        .prop_map(|(pdg, charge, momentum, parents, children)| Particle {
            pdg,
            charge,
            momentum,
            parents,
            children,
        })
}

/// Strategy for generating tracker hits.
pub fn tracker_hit_strategy() -> impl Strategy<Value = SimTrackerHit> {
    (
        any::<u64>(),
        0u64..10_000_000,
        any::<i64>(),
        prop::array::uniform3(any::<i64>()),
        1u64..64,
    )
        .prop_map(|(cell_id, edep, time, position, particle)| SimTrackerHit {
            cell_id,
            edep,
            time,
            position,
            particle,
        })
}

/// Strategy for generating calorimeter hits.
pub fn calo_hit_strategy() -> impl Strategy<Value = CaloHit> {
    (any::<u64>(), any::<u64>()).prop_map(|(cell_id, energy)| CaloHit { cell_id, energy })
}

/// Strategy for generating any fixture entry.
pub fn fixture_entry_strategy() -> impl Strategy<Value = FixtureEntry> {
    prop_oneof![
        particle_strategy().prop_map(FixtureEntry::Particle),
        tracker_hit_strategy().prop_map(FixtureEntry::TrackerHit),
        calo_hit_strategy().prop_map(FixtureEntry::CaloHit),
    ]
}

/// Strategy for generating events of up to `max_entries` entries spread
/// over a handful of tags.
pub fn event_spec_strategy(max_entries: usize) -> impl Strategy<Value = EventSpec> {
    prop::collection::vec(tag_strategy(), 1..4).prop_flat_map(move |tags| {
        prop::collection::vec(
            (prop::sample::select(tags), fixture_entry_strategy()),
            0..=max_entries,
        )
        .prop_map(|entries| EventSpec { entries })
    })
}

/// Strategy for picking a compression kind.
pub fn compression_strategy() -> impl Strategy<Value = Compression> {
    prop_oneof![
        Just(Compression::None),
        Just(Compression::Gzip),
        Just(Compression::Lz4),
    ]
}
