//! Benchmark utilities.

use proio_core::{Compression, Event};
use proio_storage::MemoryBuffer;
use proio_testkit::{detector_event, write_events, CaloHit, Particle};

/// Compression kinds measured by every stream benchmark.
pub const COMPRESSIONS: [Compression; 3] = [Compression::None, Compression::Gzip, Compression::Lz4];

/// An event carrying `particles` particles and as many calorimeter hits.
pub fn busy_event(particles: usize) -> Event {
    let mut event = detector_event(particles as u64);
    for i in 0..particles {
        let shift = i as i64;
        event.add_entry(
            "MCParticles",
            Box::new(Particle::pion([shift, -shift, 1_000 * shift])),
        );
        event.add_entry(
            "CaloHits",
            Box::new(CaloHit {
                cell_id: i as u64,
                energy: 250 * i as u64,
            }),
        );
    }
    event
}

/// Generates `count` events of `particles` particles each.
pub fn generate_events(count: usize, particles: usize) -> Vec<Event> {
    (0..count).map(|_| busy_event(particles)).collect()
}

/// A stream of `count` events written with `compression`, one bucket per
/// hundred events.
pub fn prepared_stream(count: usize, particles: usize, compression: Compression) -> MemoryBuffer {
    let mut events = generate_events(count, particles);
    match write_events(&mut events, compression, 100) {
        Ok(buffer) => buffer,
        Err(e) => panic!("failed to prepare stream: {e}"),
    }
}
