//! # Single-value keyed container
//!
//! The live generation is a `DashMap` behind an `ArcSwap`:
//! - base loads build a private map and publish it with one `store`
//! - incremental loads, `set` and `del` write into the live map directly
//! - readers load the current generation without waiting on any pass
//! - `range` walks a copy, so its callback may mutate the container

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;

use super::errors::{ContainerError, ContainerResult};
use super::record::RecordIterator;
use super::stats::{LoadStats, PassCounter, Tolerance};
use super::{drain, Container, Key, PassLock, Value};

/// Thread-safe Key → Value container with base and incremental loads.
pub struct KMapContainer<K: Key, V: Value> {
    live: ArcSwap<DashMap<K, V>>,
    tolerance: Tolerance,
    counter: PassCounter,
    generation: AtomicU64,
    pass: PassLock,
}

impl<K: Key, V: Value> KMapContainer<K, V> {
    /// Create an empty container.
    pub fn new(tolerance: Tolerance) -> Self {
        Self {
            live: ArcSwap::from_pointee(DashMap::new()),
            tolerance,
            counter: PassCounter::default(),
            generation: AtomicU64::new(0),
            pass: PassLock::default(),
        }
    }

    /// The configured tolerance
    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    /// Number of base loads published so far. Zero means never loaded.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Copy of the live mapping.
    pub fn to_hash_map(&self) -> HashMap<K, V> {
        self.live
            .load()
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

impl<K: Key, V: Value> fmt::Debug for KMapContainer<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KMapContainer")
            .field("tolerance", &self.tolerance)
            .field("generation", &self.generation())
            .field("last_stats", &self.counter.snapshot())
            .finish()
    }
}

impl<K: Key, V: Value> Default for KMapContainer<K, V> {
    fn default() -> Self {
        Self::new(Tolerance::default())
    }
}

impl<K: Key, V: Value> Container<K, V> for KMapContainer<K, V> {
    type Output = V;

    fn get(&self, key: &K) -> ContainerResult<V> {
        self.live
            .load()
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or(ContainerError::NotFound)
    }

    fn load_base(&self, iter: &mut dyn RecordIterator<K, V>) -> ContainerResult<LoadStats> {
        let _pass = self.pass.acquire();
        self.counter.reset();

        let next = DashMap::new();
        drain(iter, &self.counter, |record| {
            if record.mode.is_upsert() {
                next.insert(record.key, record.value);
            } else {
                next.remove(&record.key);
            }
            Ok(())
        })?;

        let stats = self.counter.snapshot();
        self.tolerance.check(stats)?;

        self.live.store(Arc::new(next));
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(stats)
    }

    fn load_inc(&self, iter: &mut dyn RecordIterator<K, V>) -> ContainerResult<LoadStats> {
        let _pass = self.pass.acquire();
        self.counter.reset();

        drain(iter, &self.counter, |record| {
            let live = self.live.load();
            if record.mode.is_upsert() {
                live.insert(record.key, record.value);
            } else {
                live.remove(&record.key);
            }
            Ok(())
        })?;

        // Mutations applied before a breach stay live.
        let stats = self.counter.snapshot();
        self.tolerance.check(stats)?;
        Ok(stats)
    }

    fn set(&self, key: K, value: V) -> ContainerResult<()> {
        self.live.load().insert(key, value);
        Ok(())
    }

    fn del(&self, key: &K) -> ContainerResult<()> {
        self.live.load().remove(key);
        Ok(())
    }

    fn range(&self, f: &mut dyn FnMut(&K, &V) -> bool) {
        // Shard locks are released before `f` runs, so it may write back.
        let snapshot: Vec<(K, V)> = self
            .live
            .load()
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        for (key, value) in &snapshot {
            if !f(key, value) {
                break;
            }
        }
    }

    fn last_stats(&self) -> LoadStats {
        self.counter.snapshot()
    }
}
