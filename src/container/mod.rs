//! # Reloadable Containers
//!
//! A container owns the live mapping that readers query. It is rebuilt by
//! base loads (a fresh mapping published with one atomic swap) and, for the
//! single-value variant, patched in place by incremental loads.
//!
//! ## Variants
//!
//! - [`KMapContainer`]: Key → Value, base + incremental loads
//! - [`KListContainer`]: Key → [Value], base load only
//!
//! ## Invariants
//!
//! - Readers see one generation in its entirety, never a half-built base load
//! - A failed base load (source error or tolerance breach) leaves the live
//!   generation untouched
//! - Incremental mutations are applied as they arrive and are not rolled back

pub mod errors;
pub mod klist;
pub mod kmap;
pub mod record;
pub mod stats;

use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub use errors::{ContainerError, ContainerResult, RecordError, SourceError, SourceErrorKind};
pub use klist::KListContainer;
pub use kmap::KMapContainer;
pub use record::{Mode, Record, RecordBatch, RecordIterator};
pub use stats::{LoadStats, Tolerance};

use stats::PassCounter;

/// Anything usable as a container key.
///
/// Equality and hashing of the key type define key identity.
pub trait Key: Eq + Hash + Clone + Send + Sync + 'static {}

impl<T> Key for T where T: Eq + Hash + Clone + Send + Sync + 'static {}

/// Anything storable as a container value.
pub trait Value: Clone + Send + Sync + 'static {}

impl<T> Value for T where T: Clone + Send + Sync + 'static {}

/// Capability set shared by all container variants.
///
/// Variants that lack a capability return [`ContainerError::NotImplemented`].
pub trait Container<K, V>: Send + Sync {
    /// What a lookup yields (`V` for single-value, `Vec<V>` for multi-value)
    type Output;

    /// Look up a key. `NotFound` if absent or never loaded.
    fn get(&self, key: &K) -> ContainerResult<Self::Output>;

    /// Rebuild from a full pass and publish atomically.
    fn load_base(&self, iter: &mut dyn RecordIterator<K, V>) -> ContainerResult<LoadStats>;

    /// Apply a batch of upserts/deletes to the live mapping.
    fn load_inc(&self, iter: &mut dyn RecordIterator<K, V>) -> ContainerResult<LoadStats>;

    /// Upsert one entry in the live mapping.
    fn set(&self, key: K, value: V) -> ContainerResult<()>;

    /// Remove one entry from the live mapping.
    fn del(&self, key: &K) -> ContainerResult<()>;

    /// Visit live entries until `f` returns false. No ordering guarantee.
    fn range(&self, f: &mut dyn FnMut(&K, &Self::Output) -> bool);

    /// Number of live entries, by traversal.
    fn len(&self) -> usize {
        let mut count = 0;
        self.range(&mut |_, _| {
            count += 1;
            true
        });
        count
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counts of the most recent (or in-progress) load pass.
    fn last_stats(&self) -> LoadStats;
}

/// Pull every record out of `iter`, counting good and bad ones.
///
/// `apply` failures count as record errors. A `has_next` failure aborts.
pub(crate) fn drain<K, V>(
    iter: &mut dyn RecordIterator<K, V>,
    counter: &PassCounter,
    mut apply: impl FnMut(Record<K, V>) -> Result<(), RecordError>,
) -> Result<(), SourceError> {
    while iter.has_next()? {
        match iter.next_record().and_then(&mut apply) {
            Ok(()) => counter.record_ok(),
            Err(_) => counter.record_err(),
        }
    }
    Ok(())
}

/// Serializes load passes on one container so their counters never mix.
#[derive(Debug, Default)]
pub(crate) struct PassLock(Mutex<()>);

impl PassLock {
    pub(crate) fn acquire(&self) -> MutexGuard<'_, ()> {
        // The guarded unit carries no state, so a poisoned lock is still usable.
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_counts_and_applies() {
        let counter = PassCounter::default();
        let mut batch = RecordBatch::new(vec![
            Ok(Record::add("a", 1)),
            Err(RecordError::new("garbled")),
            Ok(Record::add("b", 2)),
        ]);
        let mut seen = Vec::new();

        drain(&mut batch, &counter, |r| {
            seen.push(r.key);
            Ok(())
        })
        .unwrap();

        assert_eq!(seen, vec!["a", "b"]);
        assert_eq!(counter.snapshot(), LoadStats { total: 3, errors: 1 });
    }

    #[test]
    fn test_drain_apply_failure_is_record_error() {
        let counter = PassCounter::default();
        let mut batch = RecordBatch::from_records(vec![Record::add("a", 1)]);

        drain(&mut batch, &counter, |_| Err(RecordError::new("rejected"))).unwrap();

        assert_eq!(counter.snapshot(), LoadStats { total: 1, errors: 1 });
    }

    #[test]
    fn test_drain_stops_on_source_error() {
        let counter = PassCounter::default();
        let mut batch = RecordBatch::from_records(vec![Record::add("a", 1), Record::add("b", 2)])
            .fail_after(1, SourceError::connectivity("gone"));

        let err = drain(&mut batch, &counter, |_| Ok(())).unwrap_err();

        assert_eq!(err.kind(), SourceErrorKind::Connectivity);
        assert_eq!(counter.snapshot().total, 1);
    }
}
