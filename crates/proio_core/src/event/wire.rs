//! Persisted event state.
//!
//! An event on the wire is a canonical CBOR map:
//!
//! | key        | value                                   |
//! |------------|-----------------------------------------|
//! | `entries`  | map of entry id → `[type id, payload]`  |
//! | `nentries` | last assigned entry id                  |
//! | `types`    | map of type id → type name              |
//! | `ntypes`   | last assigned type id                   |
//! | `tags`     | map of tag → array of entry ids         |

use super::{EntryRecord, Event};
use crate::error::{CoreError, CoreResult};
use proio_codec::{from_cbor, to_canonical_cbor, CodecError, CodecResult, Value};
use std::collections::{BTreeMap, HashMap};

const KEY_ENTRIES: &str = "entries";
const KEY_ENTRY_COUNT: &str = "nentries";
const KEY_TYPES: &str = "types";
const KEY_TYPE_COUNT: &str = "ntypes";
const KEY_TAGS: &str = "tags";

/// Plain persisted state, without live objects or pools.
pub(super) struct PersistedState {
    pub(super) entries: BTreeMap<u64, EntryRecord>,
    pub(super) n_entries: u64,
    pub(super) types: BTreeMap<u64, String>,
    pub(super) type_ids: HashMap<String, u64>,
    pub(super) n_types: u64,
    pub(super) tags: BTreeMap<String, Vec<u64>>,
}

impl Event {
    /// Serializes the persisted state, flushing the entry cache first.
    pub fn to_bytes(&mut self) -> CoreResult<Vec<u8>> {
        self.flush_cache()?;
        let value = self
            .persisted_value()
            .map_err(|e| CoreError::serialization(e.to_string()))?;
        to_canonical_cbor(&value).map_err(|e| CoreError::serialization(e.to_string()))
    }

    fn persisted_value(&self) -> CodecResult<Value> {
        let mut entries = Vec::with_capacity(self.entries.len());
        for (id, record) in &self.entries {
            if record.live.is_some() {
                return Err(CodecError::encoding_failed(format!(
                    "entry {id} has not been flushed"
                )));
            }
            entries.push((
                Value::from(*id),
                Value::Array(vec![
                    Value::from(record.type_id),
                    Value::Bytes(record.payload.clone()),
                ]),
            ));
        }

        let types = self
            .types
            .iter()
            .map(|(id, name)| (Value::from(*id), Value::text(name.as_str())))
            .collect();

        let tags = self
            .tags
            .iter()
            .map(|(tag, ids)| {
                let ids = ids.iter().map(|id| Value::from(*id)).collect();
                (Value::text(tag.as_str()), Value::Array(ids))
            })
            .collect();

        Ok(Value::map(vec![
            (Value::text(KEY_ENTRIES), Value::map(entries)),
            (Value::text(KEY_ENTRY_COUNT), Value::from(self.n_entries)),
            (Value::text(KEY_TYPES), Value::map(types)),
            (Value::text(KEY_TYPE_COUNT), Value::from(self.n_types)),
            (Value::text(KEY_TAGS), Value::map(tags)),
        ]))
    }
}

/// Parses persisted state produced by [`Event::to_bytes`].
pub(super) fn parse(bytes: &[u8]) -> CoreResult<PersistedState> {
    from_cbor(bytes)
        .and_then(|value| state_from_value(&value))
        .map_err(|e| CoreError::deserialization(format!("event: {e}")))
}

fn map_field<'a>(value: &'a Value, key: &str) -> CodecResult<&'a [(Value, Value)]> {
    value
        .field(key)?
        .as_map()
        .ok_or_else(|| CodecError::invalid_structure(format!("{key} must be a map")))
}

fn uint(value: &Value, what: &str) -> CodecResult<u64> {
    value
        .as_u64()
        .ok_or_else(|| CodecError::invalid_structure(format!("{what} must be unsigned")))
}

fn state_from_value(value: &Value) -> CodecResult<PersistedState> {
    let mut entries = BTreeMap::new();
    for (id, record) in map_field(value, KEY_ENTRIES)? {
        let parts = record
            .as_array()
            .filter(|parts| parts.len() == 2)
            .ok_or_else(|| CodecError::invalid_structure("entry must be [type, payload]"))?;
        let payload = parts[1]
            .as_bytes()
            .ok_or_else(|| CodecError::invalid_structure("entry payload must be bytes"))?;
        entries.insert(
            uint(id, "entry id")?,
            EntryRecord {
                type_id: uint(&parts[0], "entry type")?,
                payload: payload.to_vec(),
                live: None,
            },
        );
    }

    let mut types = BTreeMap::new();
    let mut type_ids = HashMap::new();
    for (id, name) in map_field(value, KEY_TYPES)? {
        let id = uint(id, "type id")?;
        let name = name
            .as_text()
            .ok_or_else(|| CodecError::invalid_structure("type name must be text"))?;
        if type_ids.insert(name.to_string(), id).is_some() {
            return Err(CodecError::invalid_structure(format!(
                "type {name} listed twice"
            )));
        }
        types.insert(id, name.to_string());
    }

    let mut tags = BTreeMap::new();
    for (tag, ids) in map_field(value, KEY_TAGS)? {
        let tag = tag
            .as_text()
            .ok_or_else(|| CodecError::invalid_structure("tag name must be text"))?;
        let ids = ids
            .as_array()
            .ok_or_else(|| CodecError::invalid_structure("tag ids must be an array"))?
            .iter()
            .map(|id| uint(id, "tagged id"))
            .collect::<CodecResult<Vec<u64>>>()?;
        tags.insert(tag.to_string(), ids);
    }

    let n_entries = value.u64_field(KEY_ENTRY_COUNT)?;
    let n_types = value.u64_field(KEY_TYPE_COUNT)?;
    // counters hand out the next id, so they must cover every id in use
    if let Some(max) = entries.keys().next_back().filter(|max| **max > n_entries) {
        return Err(CodecError::invalid_structure(format!(
            "entry id {max} exceeds entry counter {n_entries}"
        )));
    }
    if let Some(max) = types.keys().next_back().filter(|max| **max > n_types) {
        return Err(CodecError::invalid_structure(format!(
            "type id {max} exceeds type counter {n_types}"
        )));
    }

    Ok(PersistedState {
        entries,
        n_entries,
        types,
        type_ids,
        n_types,
        tags,
    })
}
