//! Container Reload Tests
//!
//! - Base loads publish whole generations; readers never see a mix
//! - Tolerance gate decides publication, identically for both variants
//! - Incremental loads mutate the live mapping in place

use hotdict::container::{
    Container, ContainerError, KListContainer, KMapContainer, LoadStats, Record, RecordBatch,
    RecordError, SourceError, Tolerance,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

// =============================================================================
// Test Utilities
// =============================================================================

const KEYS: usize = 200;

fn generation_batch(generation: u64) -> RecordBatch<String, u64> {
    RecordBatch::from_records(
        (0..KEYS)
            .map(|i| Record::add(format!("k{}", i), generation))
            .collect(),
    )
}

fn with_errors(good: &[(&str, i64)], bad: usize) -> RecordBatch<String, i64> {
    let mut batch = RecordBatch::from_records(
        good.iter()
            .map(|(k, v)| Record::add(k.to_string(), *v))
            .collect(),
    );
    for i in 0..bad {
        batch.push(Err(RecordError::new(format!("bad record {}", i))));
    }
    batch
}

fn tolerance(ratio: f64) -> Tolerance {
    Tolerance::new(ratio).unwrap()
}

// =============================================================================
// Atomic publication
// =============================================================================

#[test]
fn test_readers_never_observe_mixed_generations() {
    let container = Arc::new(KMapContainer::new(Tolerance::STRICT));
    container.load_base(&mut generation_batch(0)).unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let container = Arc::clone(&container);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut snapshots = 0u64;
                loop {
                    let mut seen = Vec::with_capacity(KEYS);
                    container.range(&mut |_, v| {
                        seen.push(*v);
                        true
                    });
                    assert_eq!(seen.len(), KEYS, "partial generation visible");
                    assert!(
                        seen.iter().all(|v| *v == seen[0]),
                        "mixed generations in one snapshot"
                    );

                    // Keys present in every generation are never missing
                    assert!(container.get(&"k7".to_string()).is_ok());
                    snapshots += 1;
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                }
                snapshots
            })
        })
        .collect();

    for generation in 1..=50 {
        container.load_base(&mut generation_batch(generation)).unwrap();
    }
    stop.store(true, Ordering::Relaxed);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    assert_eq!(container.get(&"k0".to_string()).unwrap(), 50);
    assert_eq!(container.generation(), 51);
}

#[test]
fn test_range_interleaves_with_incremental_writes() {
    let container = Arc::new(KMapContainer::new(Tolerance::STRICT));
    container.load_base(&mut generation_batch(0)).unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..2)
        .map(|_| {
            let container = Arc::clone(&container);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut snapshots = 0u64;
                loop {
                    let mut seen = 0;
                    container.range(&mut |k, _| {
                        // Reads and writes from inside the walk must not block
                        assert!(container.get(k).is_ok());
                        container.set("scratch".to_string(), 0).unwrap();
                        seen += 1;
                        true
                    });
                    assert!(seen >= KEYS);
                    snapshots += 1;
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                }
                snapshots
            })
        })
        .collect();

    for pass in 1..=50 {
        container.load_inc(&mut generation_batch(pass)).unwrap();
    }
    stop.store(true, Ordering::Relaxed);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    container.del(&"scratch".to_string()).unwrap();
    assert_eq!(container.len(), KEYS);
    assert!(container
        .to_hash_map()
        .values()
        .all(|v| *v == 50));
}

#[test]
fn test_failed_pass_keeps_serving_previous_generation() {
    let container = KMapContainer::new(Tolerance::STRICT);
    container.load_base(&mut generation_batch(1)).unwrap();

    let mut failing = generation_batch(2).fail_after(KEYS / 2, SourceError::connectivity("reset"));
    let err = container.load_base(&mut failing).unwrap_err();

    assert!(err.source_error().unwrap().is_retryable());
    assert_eq!(container.get(&"k199".to_string()).unwrap(), 1);
    assert_eq!(container.len(), KEYS);
}

// =============================================================================
// Tolerance gate
// =============================================================================

#[test]
fn test_tolerance_half_accepts_one_bad_record_in_four() {
    let container = KMapContainer::new(tolerance(0.5));
    let stats = container
        .load_base(&mut with_errors(&[("a", 1), ("b", 2), ("c", 3)], 1))
        .unwrap();

    assert_eq!(stats, LoadStats { total: 4, errors: 1 });
    assert_eq!(container.len(), 3);
    assert_eq!(container.get(&"b".to_string()).unwrap(), 2);
}

#[test]
fn test_tolerance_breach_keeps_prior_mapping() {
    let container = KMapContainer::new(tolerance(0.2));
    container
        .load_base(&mut with_errors(&[("z", 26)], 0))
        .unwrap();

    let err = container
        .load_base(&mut with_errors(&[("a", 1), ("b", 2), ("c", 3)], 1))
        .unwrap_err();

    match err {
        ContainerError::ToleranceExceeded { ratio, tolerance, stats } => {
            assert_eq!(ratio, 0.25);
            assert_eq!(tolerance, 0.2);
            assert_eq!(stats.errors, 1);
        }
        other => panic!("expected tolerance breach, got {:?}", other),
    }
    assert_eq!(container.get(&"z".to_string()).unwrap(), 26);
    assert!(container.get(&"a".to_string()).unwrap_err().is_not_found());
}

#[test]
fn test_both_variants_apply_the_same_gate() {
    let map = KMapContainer::new(tolerance(0.3));
    let list = KListContainer::new(tolerance(0.3));

    let map_err = map.load_base(&mut with_errors(&[("a", 1), ("b", 2)], 1));
    let list_err = list.load_base(&mut with_errors(&[("a", 1), ("b", 2)], 1));
    assert!(matches!(map_err, Err(ContainerError::ToleranceExceeded { .. })));
    assert!(matches!(list_err, Err(ContainerError::ToleranceExceeded { .. })));

    assert!(map.load_base(&mut with_errors(&[("a", 1), ("b", 2), ("c", 3)], 1)).is_ok());
    assert!(list.load_base(&mut with_errors(&[("a", 1), ("b", 2), ("c", 3)], 1)).is_ok());
}

#[test]
fn test_empty_pass_publishes_empty_generation() {
    let container = KMapContainer::new(Tolerance::STRICT);
    container.load_base(&mut with_errors(&[("a", 1)], 0)).unwrap();

    let stats = container.load_base(&mut RecordBatch::default()).unwrap();

    assert_eq!(stats, LoadStats::default());
    assert!(container.is_empty());
}

// =============================================================================
// Reload semantics
// =============================================================================

#[test]
fn test_identical_reload_is_idempotent() {
    let container = KMapContainer::new(Tolerance::STRICT);
    container.load_base(&mut generation_batch(3)).unwrap();
    let before = container.to_hash_map();

    container.load_base(&mut generation_batch(3)).unwrap();

    assert_eq!(container.to_hash_map(), before);
}

#[test]
fn test_incremental_delete_and_upsert() {
    let container = KMapContainer::new(Tolerance::STRICT);
    container
        .load_base(&mut with_errors(&[("a", 1), ("b", 2)], 0))
        .unwrap();

    container
        .load_inc(&mut RecordBatch::from_records(vec![Record::delete(
            "a".to_string(),
            0,
        )]))
        .unwrap();
    assert!(container.get(&"a".to_string()).unwrap_err().is_not_found());
    assert_eq!(container.get(&"b".to_string()).unwrap(), 2);
    assert_eq!(container.len(), 1);

    container
        .load_inc(&mut RecordBatch::from_records(vec![
            Record::update("b".to_string(), 20),
            Record::add("c".to_string(), 3),
        ]))
        .unwrap();
    assert_eq!(container.get(&"b".to_string()).unwrap(), 20);
    assert_eq!(container.get(&"c".to_string()).unwrap(), 3);
}

#[test]
fn test_multi_value_container_keeps_every_value() {
    let list = KListContainer::new(Tolerance::STRICT);
    list.load_base(&mut RecordBatch::from_records(vec![
        Record::add("tag".to_string(), 1),
        Record::add("tag".to_string(), 2),
        Record::add("other".to_string(), 3),
    ]))
    .unwrap();

    assert_eq!(list.get(&"tag".to_string()).unwrap(), vec![1, 2]);
    assert_eq!(list.len(), 2);
    assert!(matches!(
        list.set("tag".to_string(), 4),
        Err(ContainerError::NotImplemented(_))
    ));
}
