//! # Registry
//!
//! Name → streamer map. Lookups resolve the streamer, then delegate to the
//! container it currently holds. The registry is an ordinary value; callers
//! share it by reference or `Arc`.

mod errors;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::container::Container;
use crate::observability::{log_event_with_fields, Event};
use crate::streamer::{Info, Streamer};

pub use errors::{RegistryError, RegistryResult};

type SharedStreamer<K, V, O> = Arc<dyn Streamer<K, V, O>>;

/// Named collection of streamers sharing key/value types
pub struct Registry<K, V, O> {
    streamers: RwLock<HashMap<String, SharedStreamer<K, V, O>>>,
}

impl<K, V, O> Registry<K, V, O> {
    pub fn new() -> Self {
        Self {
            streamers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a streamer under `name`. Names are unique.
    pub fn register(
        &self,
        name: impl Into<String>,
        streamer: SharedStreamer<K, V, O>,
    ) -> RegistryResult<()> {
        let name = name.into();
        let mut streamers = self
            .streamers
            .write()
            .map_err(|_| RegistryError::Internal)?;

        if streamers.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }

        log_event_with_fields(
            Event::StreamerRegistered,
            &[("name", name.as_str()), ("streamer", streamer.name())],
        );
        streamers.insert(name, streamer);
        Ok(())
    }

    pub fn get_streamer(&self, name: &str) -> RegistryResult<SharedStreamer<K, V, O>> {
        self.streamers
            .read()
            .map_err(|_| RegistryError::Internal)?
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::StreamerNotFound(name.to_string()))
    }

    /// Look up `key` in the container of streamer `name`.
    pub fn get(&self, name: &str, key: &K) -> RegistryResult<O> {
        let container = self
            .get_streamer(name)?
            .container()
            .ok_or_else(|| RegistryError::NoContainer(name.to_string()))?;
        Ok(container.get(key)?)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = match self.streamers.read() {
            Ok(streamers) => streamers.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    /// Health snapshot of every streamer, sorted by name
    pub fn infos(&self) -> Vec<Info> {
        self.names()
            .iter()
            .filter_map(|name| self.get_streamer(name).ok())
            .map(|streamer| streamer.info())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.streamers.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V, O> Default for Registry<K, V, O> {
    fn default() -> Self {
        Self::new()
    }
}
