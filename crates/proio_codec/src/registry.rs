//! Entry type registry.
//!
//! Readers only know an entry by the type name stored in the event's type
//! table. The registry maps those names to constructors so that raw bytes
//! can be turned back into typed objects.

use crate::entry::{Entry, EntryType};
use crate::error::{CodecError, CodecResult};
use std::collections::HashMap;
use std::fmt;

type Factory = fn() -> Box<dyn Entry>;

fn construct<T: EntryType>() -> Box<dyn Entry> {
    Box::new(T::default())
}

/// Maps fully qualified type names to entry constructors.
#[derive(Clone, Default)]
pub struct EntryRegistry {
    factories: HashMap<String, Factory>,
}

impl EntryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration.
    #[must_use]
    pub fn with<T: EntryType>(mut self) -> Self {
        self.register::<T>();
        self
    }

    /// Register `T` under its type name, replacing any earlier constructor.
    pub fn register<T: EntryType>(&mut self) {
        self.factories
            .insert(T::TYPE_NAME.to_string(), construct::<T>);
    }

    /// Returns true if a constructor is registered under `type_name`.
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Construct an empty entry of the named type.
    pub fn create(&self, type_name: &str) -> CodecResult<Box<dyn Entry>> {
        self.factories
            .get(type_name)
            .map(|factory| factory())
            .ok_or_else(|| CodecError::UnregisteredType {
                type_name: type_name.to_string(),
            })
    }

    /// Registered type names in sorted order.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for EntryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}
