//! # Multi-value keyed container
//!
//! Key → ordered list of values, rebuilt only by base loads. Every record's
//! value is appended under its key regardless of mode. The published map is
//! immutable, so readers never contend with anything.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use super::errors::{ContainerError, ContainerResult};
use super::record::RecordIterator;
use super::stats::{LoadStats, PassCounter, Tolerance};
use super::{drain, Container, Key, PassLock, Value};

/// Double-buffered Key → [Value] container supporting base loads only.
pub struct KListContainer<K: Key, V: Value> {
    live: ArcSwap<HashMap<K, Vec<V>>>,
    tolerance: Tolerance,
    counter: PassCounter,
    generation: AtomicU64,
    pass: PassLock,
}

impl<K: Key, V: Value> KListContainer<K, V> {
    /// Create an empty container.
    pub fn new(tolerance: Tolerance) -> Self {
        Self {
            live: ArcSwap::from_pointee(HashMap::new()),
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

    /// Number of base loads published so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// The current generation, shared.
    pub fn snapshot(&self) -> Arc<HashMap<K, Vec<V>>> {
        self.live.load_full()
    }
}

impl<K: Key, V: Value> fmt::Debug for KListContainer<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KListContainer")
            .field("tolerance", &self.tolerance)
            .field("generation", &self.generation())
            .field("last_stats", &self.counter.snapshot())
            .finish()
    }
}

impl<K: Key, V: Value> Default for KListContainer<K, V> {
    fn default() -> Self {
        Self::new(Tolerance::default())
    }
}

impl<K: Key, V: Value> Container<K, V> for KListContainer<K, V> {
    type Output = Vec<V>;

    fn get(&self, key: &K) -> ContainerResult<Vec<V>> {
        self.live
            .load()
            .get(key)
            .cloned()
            .ok_or(ContainerError::NotFound)
    }

    fn load_base(&self, iter: &mut dyn RecordIterator<K, V>) -> ContainerResult<LoadStats> {
        let _pass = self.pass.acquire();
        self.counter.reset();

        let mut next: HashMap<K, Vec<V>> = HashMap::new();
        drain(iter, &self.counter, |record| {
            next.entry(record.key).or_default().push(record.value);
            Ok(())
        })?;

        let stats = self.counter.snapshot();
        self.tolerance.check(stats)?;

        self.live.store(Arc::new(next));
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(stats)
    }

    fn load_inc(&self, _iter: &mut dyn RecordIterator<K, V>) -> ContainerResult<LoadStats> {
        Err(ContainerError::NotImplemented("load_inc"))
    }

    fn set(&self, _key: K, _value: V) -> ContainerResult<()> {
        Err(ContainerError::NotImplemented("set"))
    }

    fn del(&self, _key: &K) -> ContainerResult<()> {
        Err(ContainerError::NotImplemented("del"))
    }

    fn range(&self, f: &mut dyn FnMut(&K, &Vec<V>) -> bool) {
        let generation = self.live.load_full();
        for (key, values) in generation.iter() {
            if !f(key, values) {
                break;
            }
        }
    }

    fn last_stats(&self) -> LoadStats {
        self.counter.snapshot()
    }
}
