//! Events: containers of typed, tagged entries.
//!
//! An [`Event`] stores each entry either as a live object (freshly added or
//! already accessed) or as encoded payload bytes (freshly read or flushed).
//! Accessing a read entry decodes it once and caches the object; flushing
//! encodes every cached object back to bytes and returns the objects to a
//! per-type pool so that a long-lived event can be refilled without
//! allocating new entries.
//!
//! # Example
//!
//! ```ignore
//! let mut event = Event::with_registry(registry);
//! let id = event.add_entry("MCParticles", Box::new(particle));
//! event.flush_cache()?;
//! let particle = event.get_entry_as::<Particle>(id)?;
//! ```

mod pool;
mod tags;
mod wire;

use crate::error::{CoreError, CoreResult};
use pool::EntryPool;
use proio_codec::{AsAny, Entry, EntryRegistry, EntryType};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// One stored entry.
#[derive(Debug)]
pub(crate) struct EntryRecord {
    type_id: u64,
    /// Encoded bytes; meaningful only while `live` is `None`.
    payload: Vec<u8>,
    live: Option<Box<dyn Entry>>,
}

/// A record of typed, tagged entries.
pub struct Event {
    entries: BTreeMap<u64, EntryRecord>,
    n_entries: u64,
    types: BTreeMap<u64, String>,
    type_ids: HashMap<String, u64>,
    n_types: u64,
    tags: BTreeMap<String, Vec<u64>>,
    dirty_tags: bool,
    pool: EntryPool,
    metadata: BTreeMap<String, String>,
    registry: Arc<EntryRegistry>,
}

impl Default for Event {
    fn default() -> Self {
        Self::with_registry(Arc::new(EntryRegistry::new()))
    }
}

impl Event {
    /// Creates an empty event with no registered entry types.
    ///
    /// Entries added to it can always be read back; entries decoded from
    /// bytes need a registry, see [`with_registry`](Self::with_registry).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty event that decodes entries through `registry`.
    pub fn with_registry(registry: Arc<EntryRegistry>) -> Self {
        Self {
            entries: BTreeMap::new(),
            n_entries: 0,
            types: BTreeMap::new(),
            type_ids: HashMap::new(),
            n_types: 0,
            tags: BTreeMap::new(),
            dirty_tags: false,
            pool: EntryPool::default(),
            metadata: BTreeMap::new(),
            registry,
        }
    }

    /// Parses an event from bytes produced by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8], registry: Arc<EntryRegistry>) -> CoreResult<Self> {
        let mut event = Self::with_registry(registry);
        event.load_bytes(bytes)?;
        Ok(event)
    }

    /// Replaces this event's contents with parsed bytes, keeping its pool.
    ///
    /// On error the event is left cleared.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> CoreResult<()> {
        self.clear();
        let state = wire::parse(bytes)?;
        self.entries = state.entries;
        self.n_entries = state.n_entries;
        self.types = state.types;
        self.type_ids = state.type_ids;
        self.n_types = state.n_types;
        self.tags = state.tags;
        // tag lists are not checked against entries until first read
        self.dirty_tags = true;
        Ok(())
    }

    /// The registry used to decode entries.
    pub fn registry(&self) -> &Arc<EntryRegistry> {
        &self.registry
    }

    /// Replaces the registry used to decode entries.
    pub fn set_registry(&mut self, registry: Arc<EntryRegistry>) {
        self.registry = registry;
    }

    /// Adds an entry and returns its id. An empty `tag` leaves it untagged.
    pub fn add_entry(&mut self, tag: &str, entry: Box<dyn Entry>) -> u64 {
        let type_id = self.type_id_for(entry.type_name());
        self.n_entries += 1;
        let id = self.n_entries;
        self.entries.insert(
            id,
            EntryRecord {
                type_id,
                payload: Vec::new(),
                live: Some(entry),
            },
        );
        if !tag.is_empty() {
            self.tag_entry(id, tag);
        }
        id
    }

    /// Adds several entries under one tag, returning their ids in order.
    pub fn add_entries(
        &mut self,
        tag: &str,
        entries: impl IntoIterator<Item = Box<dyn Entry>>,
    ) -> Vec<u64> {
        entries
            .into_iter()
            .map(|entry| self.add_entry(tag, entry))
            .collect()
    }

    fn type_id_for(&mut self, type_name: &str) -> u64 {
        if let Some(id) = self.type_ids.get(type_name) {
            return *id;
        }
        self.n_types += 1;
        self.types.insert(self.n_types, type_name.to_string());
        self.type_ids.insert(type_name.to_string(), self.n_types);
        self.n_types
    }

    /// Returns the entry with `id`, decoding and caching it if needed.
    ///
    /// `Ok(None)` means no such id. Decode problems are errors:
    /// [`CoreError::UnknownType`] when the type cannot be resolved,
    /// [`CoreError::Deserialization`] when the payload is invalid.
    pub fn get_entry(&mut self, id: u64) -> CoreResult<Option<&dyn Entry>> {
        if !self.materialize(id)? {
            return Ok(None);
        }
        Ok(self.entries.get(&id).and_then(|r| r.live.as_deref()))
    }

    /// Mutable access to the entry with `id`; changes are persisted by the
    /// next flush.
    pub fn get_entry_mut(&mut self, id: u64) -> CoreResult<Option<&mut dyn Entry>> {
        if !self.materialize(id)? {
            return Ok(None);
        }
        Ok(self
            .entries
            .get_mut(&id)
            .and_then(|r| r.live.as_deref_mut()))
    }

    /// Typed access to the entry with `id`.
    ///
    /// Returns `Ok(None)` if there is no such id or the entry is not a `T`.
    pub fn get_entry_as<T: Entry>(&mut self, id: u64) -> CoreResult<Option<&T>> {
        Ok(self.get_entry(id)?.and_then(|entry| entry.downcast_ref::<T>()))
    }

    /// Caches a live object for `id`. Returns false if the id is unknown.
    fn materialize(&mut self, id: u64) -> CoreResult<bool> {
        let Some(record) = self.entries.get_mut(&id) else {
            return Ok(false);
        };
        if record.live.is_some() {
            return Ok(true);
        }

        let type_name = self
            .types
            .get(&record.type_id)
            .ok_or(CoreError::UnknownType {
                type_id: record.type_id,
                type_name: None,
            })?;
        let mut entry = match self.pool.take(type_name) {
            Some(entry) => entry,
            None => self
                .registry
                .create(type_name)
                .map_err(|_| CoreError::UnknownType {
                    type_id: record.type_id,
                    type_name: Some(type_name.clone()),
                })?,
        };

        if let Err(e) = entry.merge_from(&record.payload) {
            self.pool.give_back(entry);
            return Err(CoreError::deserialization(format!(
                "entry {id} ({type_name}): {e}"
            )));
        }
        record.payload.clear();
        record.live = Some(entry);
        Ok(true)
    }

    /// Type name of the entry with `id`, without decoding it.
    pub fn entry_type_name(&self, id: u64) -> Option<&str> {
        let record = self.entries.get(&id)?;
        self.types.get(&record.type_id).map(String::as_str)
    }

    /// Removes an entry. Its cached object, if any, goes to the pool.
    ///
    /// Tag lists are purged lazily on the next tag read.
    pub fn remove_entry(&mut self, id: u64) -> bool {
        let Some(record) = self.entries.remove(&id) else {
            return false;
        };
        if let Some(live) = record.live {
            self.pool.give_back(live);
        }
        self.dirty_tags = true;
        true
    }

    /// Ids of all entries in ascending order.
    pub fn all_entries(&self) -> Vec<u64> {
        self.entries.keys().copied().collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the event has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Takes a cleared pooled object of type `T`, if one is available.
    pub fn free<T: EntryType>(&mut self) -> Option<Box<T>> {
        let entry = self.pool.take(T::TYPE_NAME)?;
        AsAny::into_any(entry).downcast::<T>().ok()
    }

    /// Takes a cleared pooled object of the named type.
    pub fn free_by_name(&mut self, type_name: &str) -> Option<Box<dyn Entry>> {
        self.pool.take(type_name)
    }

    /// Number of pooled objects of the named type.
    pub fn pooled(&self, type_name: &str) -> usize {
        self.pool.available(type_name)
    }

    /// Encodes every cached object to payload bytes and pools the objects,
    /// then purges dangling tag ids.
    ///
    /// Entries that fail to encode keep their cached object.
    pub fn flush_cache(&mut self) -> CoreResult<()> {
        for (id, record) in &mut self.entries {
            let Some(live) = record.live.as_ref() else {
                continue;
            };
            let bytes = live.encode().map_err(|e| {
                CoreError::serialization(format!("entry {id} ({}): {e}", live.type_name()))
            })?;
            record.payload = bytes;
            if let Some(live) = record.live.take() {
                self.pool.give_back(live);
            }
        }
        self.purge_dangling_tags();
        Ok(())
    }

    /// Resets entries, tags, types, and metadata. Cached objects move to
    /// the pool; pooled objects stay pooled.
    pub fn clear(&mut self) {
        for (_, record) in std::mem::take(&mut self.entries) {
            if let Some(live) = record.live {
                self.pool.give_back(live);
            }
        }
        self.n_entries = 0;
        self.types.clear();
        self.type_ids.clear();
        self.n_types = 0;
        self.tags.clear();
        self.dirty_tags = false;
        self.metadata.clear();
    }

    /// Stream metadata in effect for this event.
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Mutable stream metadata. Writers emit changes to it ahead of the
    /// event's bucket.
    pub fn metadata_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.metadata
    }

    /// Replaces the stream metadata.
    pub fn set_metadata(&mut self, metadata: BTreeMap<String, String>) {
        self.metadata = metadata;
    }

    /// Decodes an entry for display without touching the cache.
    fn render_entry(&self, record: &EntryRecord) -> CoreResult<String> {
        if let Some(live) = &record.live {
            return Ok(format!("{live:?}"));
        }
        let type_name = self
            .types
            .get(&record.type_id)
            .ok_or(CoreError::UnknownType {
                type_id: record.type_id,
                type_name: None,
            })?;
        let mut entry = self
            .registry
            .create(type_name)
            .map_err(|_| CoreError::UnknownType {
                type_id: record.type_id,
                type_name: Some(type_name.clone()),
            })?;
        entry
            .merge_from(&record.payload)
            .map_err(|e| CoreError::deserialization(e.to_string()))?;
        Ok(format!("{entry:?}"))
    }
}

impl Clone for Event {
    /// Deep copy. Cached objects are cloned; the pool is not copied.
    fn clone(&self) -> Self {
        let entries = self
            .entries
            .iter()
            .map(|(id, record)| {
                (
                    *id,
                    EntryRecord {
                        type_id: record.type_id,
                        payload: record.payload.clone(),
                        live: record.live.as_ref().map(|live| live.clone_entry()),
                    },
                )
            })
            .collect();
        Self {
            entries,
            n_entries: self.n_entries,
            types: self.types.clone(),
            type_ids: self.type_ids.clone(),
            n_types: self.n_types,
            tags: self.tags.clone(),
            dirty_tags: self.dirty_tags,
            pool: EntryPool::default(),
            metadata: self.metadata.clone(),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (tag, ids) in &self.tags {
            writeln!(f, "---------- TAG: {tag} ----------")?;
            for id in ids {
                // only removed entries awaiting a purge can be missing
                let Some(record) = self.entries.get(id) else {
                    continue;
                };
                writeln!(f, "ID: {id}")?;
                match self.render_entry(record) {
                    Ok(text) => {
                        let name = self.entry_type_name(*id).unwrap_or_default();
                        writeln!(f, "Entry type: {name}")?;
                        writeln!(f, "{text}")?;
                    }
                    Err(e) => writeln!(f, "{e}")?,
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("entries", &self.entries.len())
            .field("types", &self.types)
            .field("tags", &self.tags)
            .field("metadata", &self.metadata)
            .field("pool", &self.pool)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proio_codec::{CodecError, CodecResult};

    /// Minimal entry holding UTF-8 text.
    #[derive(Debug, Clone, Default, PartialEq)]
    pub(crate) struct Note {
        pub(crate) text: String,
    }

    impl Note {
        pub(crate) fn new(text: &str) -> Self {
            Self {
                text: text.to_string(),
            }
        }
    }

    impl Entry for Note {
        fn type_name(&self) -> &str {
            Self::TYPE_NAME
        }

        fn encode(&self) -> CodecResult<Vec<u8>> {
            Ok(self.text.as_bytes().to_vec())
        }

        fn merge_from(&mut self, bytes: &[u8]) -> CodecResult<()> {
            let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
            self.text.push_str(text);
            Ok(())
        }

        fn clear(&mut self) {
            self.text.clear();
        }

        fn clone_entry(&self) -> Box<dyn Entry> {
            Box::new(self.clone())
        }
    }

    impl EntryType for Note {
        const TYPE_NAME: &'static str = "test.Note";
    }

    pub(crate) fn registry() -> Arc<EntryRegistry> {
        Arc::new(EntryRegistry::new().with::<Note>())
    }

    fn note(text: &str) -> Box<dyn Entry> {
        Box::new(Note::new(text))
    }

    #[test]
    fn ids_are_never_reused() {
        let mut event = Event::new();
        let a = event.add_entry("", note("a"));
        let b = event.add_entry("", note("b"));
        assert!(event.remove_entry(b));
        let c = event.add_entry("", note("c"));
        assert_eq!((a, b, c), (1, 2, 3));
        assert_eq!(event.all_entries(), vec![1, 3]);
    }

    #[test]
    fn types_registered_once() {
        let mut event = Event::new();
        let ids = event.add_entries("t", vec![note("x"), note("y")]);
        assert_eq!(event.n_types, 1);
        assert_eq!(event.entry_type_name(ids[1]), Some("test.Note"));
        assert_eq!(event.tagged_entries("t"), ids);
    }

    #[test]
    fn flush_then_get_decodes() {
        let mut event = Event::with_registry(registry());
        let id = event.add_entry("notes", note("hello"));
        event.flush_cache().unwrap();
        assert!(event.entries[&id].live.is_none());
        assert_eq!(event.pooled(Note::TYPE_NAME), 1);

        // decoding consumes the pooled object
        let got = event.get_entry_as::<Note>(id).unwrap().unwrap();
        assert_eq!(got.text, "hello");
        assert_eq!(event.pooled(Note::TYPE_NAME), 0);
    }

    #[test]
    fn unknown_id_is_none() {
        let mut event = Event::new();
        assert!(event.get_entry(42).unwrap().is_none());
    }

    #[test]
    fn unregistered_type_is_an_error() {
        let mut writer_side = Event::new();
        let id = writer_side.add_entry("", note("x"));
        let bytes = writer_side.to_bytes().unwrap();

        let mut event = Event::from_bytes(&bytes, Arc::new(EntryRegistry::new())).unwrap();
        let err = event.get_entry(id).unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnknownType { type_id: 1, type_name: Some(ref name) } if name == "test.Note"
        ));
    }

    #[test]
    fn missing_type_id_is_an_error() {
        let mut event = Event::with_registry(registry());
        event.entries.insert(
            9,
            EntryRecord {
                type_id: 77,
                payload: Vec::new(),
                live: None,
            },
        );
        assert!(matches!(
            event.get_entry(9),
            Err(CoreError::UnknownType {
                type_id: 77,
                type_name: None
            })
        ));
    }

    #[test]
    fn bad_payload_does_not_poison_event() {
        let mut event = Event::with_registry(registry());
        let good = event.add_entry("", note("ok"));
        let bad = event.add_entry("", note(""));
        event.flush_cache().unwrap();
        event.entries.get_mut(&bad).unwrap().payload = vec![0xff, 0xfe];

        assert!(matches!(
            event.get_entry(bad),
            Err(CoreError::Deserialization { .. })
        ));
        assert_eq!(event.pooled(Note::TYPE_NAME), 2);
        assert_eq!(
            event.get_entry_as::<Note>(good).unwrap().unwrap().text,
            "ok"
        );
    }

    #[test]
    fn remove_pools_live_object() {
        let mut event = Event::new();
        let id = event.add_entry("", note("bye"));
        assert!(event.remove_entry(id));
        assert!(!event.remove_entry(id));
        let recycled = event.free::<Note>().unwrap();
        assert_eq!(*recycled, Note::default());
        assert!(event.free::<Note>().is_none());
    }

    #[test]
    fn clear_keeps_pool() {
        let mut event = Event::with_registry(registry());
        event.add_entry("a", note("1"));
        event.add_entry("b", note("2"));
        event.metadata_mut().insert("run".into(), "7".into());
        event.flush_cache().unwrap();
        event.clear();

        assert!(event.is_empty());
        assert!(event.tags().is_empty());
        assert!(event.metadata().is_empty());
        assert_eq!(event.pooled(Note::TYPE_NAME), 2);
        assert!(event.free_by_name(Note::TYPE_NAME).is_some());
        assert_eq!(event.add_entry("", note("again")), 1);
    }

    #[test]
    fn clone_is_deep() {
        let mut event = Event::new();
        let id = event.add_entry("t", note("original"));
        let mut copy = event.clone();

        copy.get_entry_mut(id)
            .unwrap()
            .unwrap()
            .downcast_mut::<Note>()
            .unwrap()
            .text = "changed".into();

        assert_eq!(
            event.get_entry_as::<Note>(id).unwrap().unwrap().text,
            "original"
        );
        assert_eq!(copy.get_entry_as::<Note>(id).unwrap().unwrap().text, "changed");
        assert_eq!(copy.pooled(Note::TYPE_NAME), 0);
    }

    #[test]
    fn bytes_round_trip() {
        let mut event = Event::with_registry(registry());
        let a = event.add_entry("x", note("alpha"));
        let b = event.add_entry("y", note("beta"));
        event.tag_entry(b, "x");
        let bytes = event.to_bytes().unwrap();

        let mut copy = Event::from_bytes(&bytes, registry()).unwrap();
        assert_eq!(copy.all_entries(), vec![a, b]);
        assert_eq!(copy.tagged_entries("x"), vec![a, b]);
        assert_eq!(copy.to_string(), event.to_string());
        assert_eq!(copy.add_entry("", note("gamma")), 3);
    }

    #[test]
    fn truncated_bytes_rejected() {
        let mut event = Event::new();
        event.add_entry("x", note("alpha"));
        let bytes = event.to_bytes().unwrap();
        let err = Event::from_bytes(&bytes[..bytes.len() - 1], registry()).unwrap_err();
        assert!(matches!(err, CoreError::Deserialization { .. }));
    }

    #[test]
    fn display_format() {
        let mut event = Event::with_registry(registry());
        event.add_entry("Hits", note("h"));
        event.flush_cache().unwrap();
        let text = event.to_string();
        assert_eq!(
            text,
            "---------- TAG: Hits ----------\nID: 1\nEntry type: test.Note\nNote { text: \"h\" }\n"
        );
        // rendering decoded a throwaway copy
        assert!(event.entries[&1].live.is_none());
    }

    #[test]
    fn display_omits_removed_entries() {
        let mut event = Event::with_registry(registry());
        event.add_entry("Hits", note("gone"));
        event.add_entry("Hits", note("kept"));
        assert!(event.remove_entry(1));
        assert!(event.dirty_tags);
        assert_eq!(
            event.to_string(),
            "---------- TAG: Hits ----------\nID: 2\nEntry type: test.Note\nNote { text: \"kept\" }\n"
        );
    }
}
