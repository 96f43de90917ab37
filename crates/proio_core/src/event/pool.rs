//! Free lists of cleared entry objects.

use proio_codec::Entry;
use std::collections::HashMap;
use std::fmt;

/// Cleared, reusable entry objects keyed by type name.
///
/// Type ids are local to one event's contents and are reassigned after a
/// clear, so the pool is keyed by name to survive across events.
#[derive(Default)]
pub(crate) struct EntryPool {
    free: HashMap<String, Vec<Box<dyn Entry>>>,
}

impl EntryPool {
    /// Clears `entry` and keeps it for reuse.
    pub(crate) fn give_back(&mut self, mut entry: Box<dyn Entry>) {
        entry.clear();
        match self.free.get_mut(entry.type_name()) {
            Some(list) => list.push(entry),
            None => {
                let name = entry.type_name().to_string();
                self.free.insert(name, vec![entry]);
            }
        }
    }

    /// Takes one cleared object of the named type.
    pub(crate) fn take(&mut self, type_name: &str) -> Option<Box<dyn Entry>> {
        self.free.get_mut(type_name)?.pop()
    }

    /// Number of pooled objects of the named type.
    pub(crate) fn available(&self, type_name: &str) -> usize {
        self.free.get(type_name).map_or(0, Vec::len)
    }
}

impl fmt::Debug for EntryPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<(&str, usize)> = self
            .free
            .iter()
            .map(|(name, list)| (name.as_str(), list.len()))
            .collect();
        counts.sort_unstable();
        f.debug_map().entries(counts).finish()
    }
}
