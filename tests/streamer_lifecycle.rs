//! Streamer Lifecycle Tests
//!
//! - Synchronous bootstrap surfaces failures and spawns nothing
//! - Background loop reloads on its cadences until cancelled
//! - Connectivity failures are retried, data failures are not

use hotdict::container::{
    Container, KMapContainer, Record, RecordBatch, RecordError, SourceError, Tolerance,
};
use hotdict::streamer::{
    BoxedRecordIterator, Cadence, LoadOutcome, LoadStreamer, SchedInfo, Source, Streamer,
    StreamerConfig, StreamerError, StreamerHooks, StreamerState,
};
use serde_json::Value;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Test Utilities
// =============================================================================

/// Every base cursor carries the number of the pass in key "gen".
/// Every incremental cursor bumps key "hits".
#[derive(Default)]
struct CountingSource {
    base_opens: AtomicU64,
    inc_opens: AtomicU64,
    connectivity_failures: AtomicU32,
    bad_records: bool,
    base_delay: Duration,
}

impl CountingSource {
    fn failing_first(failures: u32) -> Self {
        Self {
            connectivity_failures: AtomicU32::new(failures),
            ..Self::default()
        }
    }

    fn slow(base_delay: Duration) -> Self {
        Self {
            base_delay,
            ..Self::default()
        }
    }

    fn with_bad_records() -> Self {
        Self {
            bad_records: true,
            ..Self::default()
        }
    }
}

impl Source<String, u64> for CountingSource {
    fn kind(&self) -> &'static str {
        "counting"
    }

    fn open_base(&self, _: Option<&Value>) -> Result<Option<BoxedRecordIterator<String, u64>>, SourceError> {
        let pending = self.connectivity_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.connectivity_failures.store(pending - 1, Ordering::SeqCst);
            return Err(SourceError::connectivity("connection refused"));
        }

        std::thread::sleep(self.base_delay);
        let pass = self.base_opens.fetch_add(1, Ordering::SeqCst) + 1;
        let mut batch = RecordBatch::from_records(vec![
            Record::add("gen".to_string(), pass),
            Record::add("fixed".to_string(), 1),
        ]);
        if self.bad_records {
            batch.push(Err(RecordError::new("garbage")));
        }
        Ok(Some(Box::new(batch)))
    }

    fn open_inc(&self, _: Option<&Value>) -> Result<Option<BoxedRecordIterator<String, u64>>, SourceError> {
        let hits = self.inc_opens.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Some(Box::new(RecordBatch::from_records(vec![Record::update(
            "hits".to_string(),
            hits,
        )]))))
    }
}

fn build(
    source: Arc<CountingSource>,
    sched: SchedInfo,
) -> (Arc<LoadStreamer<String, u64, u64>>, Arc<KMapContainer<String, u64>>) {
    let container = Arc::new(KMapContainer::new(Tolerance::STRICT));
    let config = StreamerConfig::new("counting", Cadence::Disabled)
        .with_sched(sched)
        .with_retries(2, Duration::from_millis(1));
    let streamer = LoadStreamer::new(config, source)
        .unwrap()
        .with_container(container.clone());
    (Arc::new(streamer), container)
}

async fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

fn every_ms(ms: u64) -> Cadence {
    Cadence::Every(Duration::from_millis(ms))
}

// =============================================================================
// Bootstrap
// =============================================================================

#[tokio::test]
async fn test_sync_bootstrap_failure_is_returned() {
    let source = Arc::new(CountingSource::with_bad_records());
    let (streamer, container) = build(source.clone(), SchedInfo::base_only(every_ms(10)));

    let err = streamer
        .clone()
        .update_data(CancellationToken::new())
        .unwrap_err();

    assert!(matches!(err, StreamerError::Container(_)));
    assert_eq!(err.code(), "HOTDICT_TOLERANCE_EXCEEDED");
    assert_eq!(streamer.state(), StreamerState::Uninitialized);
    assert!(container.is_empty());

    // Nothing was spawned: no further passes happen
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(source.base_opens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_sync_bootstrap_loads_before_returning() {
    let source = Arc::new(CountingSource::default());
    let (streamer, container) = build(source, SchedInfo::base_only(Cadence::Disabled));

    let token = CancellationToken::new();
    let handle = streamer.clone().update_data(token.clone()).unwrap();

    assert_eq!(container.get(&"gen".to_string()).unwrap(), 1);
    assert_eq!(streamer.state(), StreamerState::Ready);

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_async_bootstrap_loads_in_background() {
    let source = Arc::new(CountingSource::default());
    let sched = SchedInfo::base_only(Cadence::Disabled).with_sync_bootstrap(false);
    let (streamer, container) = build(source, sched);

    let token = CancellationToken::new();
    let handle = streamer.clone().update_data(token.clone()).unwrap();

    wait_for("background bootstrap", || streamer.state() == StreamerState::Ready).await;
    assert_eq!(container.get(&"gen".to_string()).unwrap(), 1);
    assert!(streamer.info().last_base_time.is_some());

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_bootstrap_retries_connectivity_failures() {
    let attempts = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&attempts);

    let source = Arc::new(CountingSource::failing_first(2));
    let container = Arc::new(KMapContainer::new(Tolerance::STRICT));
    let config = StreamerConfig::new("flaky", Cadence::Disabled)
        .with_retries(2, Duration::from_millis(1));
    let streamer: Arc<LoadStreamer<String, u64, u64>> = Arc::new(
        LoadStreamer::new(config, source)
            .unwrap()
            .with_container(container.clone())
            .with_hooks(StreamerHooks::new().after_base(move |report| {
                sink.lock().unwrap().push(report.attempts);
            })),
    );

    let token = CancellationToken::new();
    let handle = streamer.clone().update_data(token.clone()).unwrap();

    assert_eq!(*attempts.lock().unwrap(), vec![3]);
    assert_eq!(container.get(&"gen".to_string()).unwrap(), 1);

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_sync_bootstrap_does_not_starve_other_tasks() {
    let ticks = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&ticks);
    let ticker = tokio::spawn(async move {
        loop {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    let source = Arc::new(CountingSource::slow(Duration::from_millis(200)));
    let (streamer, container) = build(source, SchedInfo::base_only(Cadence::Disabled));
    let token = CancellationToken::new();

    // Bootstrap from a task on the only worker thread
    let before = ticks.load(Ordering::SeqCst);
    let bootstrap = {
        let streamer = Arc::clone(&streamer);
        let token = token.clone();
        tokio::spawn(async move { streamer.update_data(token) })
    };
    let handle = bootstrap.await.unwrap().unwrap();
    let during = ticks.load(Ordering::SeqCst) - before;

    assert!(during >= 3, "other tasks stalled during bootstrap ({} ticks)", during);
    assert_eq!(container.get(&"gen".to_string()).unwrap(), 1);

    token.cancel();
    handle.await.unwrap();
    ticker.abort();
}

// =============================================================================
// Refresh loop
// =============================================================================

#[tokio::test]
async fn test_base_cadence_reloads_until_cancelled() {
    let source = Arc::new(CountingSource::default());
    let (streamer, container) = build(source.clone(), SchedInfo::base_only(every_ms(20)));

    let token = CancellationToken::new();
    let handle = streamer.clone().update_data(token.clone()).unwrap();

    wait_for("three base passes", || {
        container.get(&"gen".to_string()).map_or(false, |pass| pass >= 3)
    })
    .await;

    token.cancel();
    handle.await.unwrap();
    assert_eq!(streamer.state(), StreamerState::Cancelled);

    let passes = source.base_opens.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(source.base_opens.load(Ordering::SeqCst), passes);

    // Data stays readable after cancellation
    assert_eq!(container.get(&"fixed".to_string()).unwrap(), 1);
}

#[tokio::test]
async fn test_inc_cadence_merges_into_live_data() {
    let source = Arc::new(CountingSource::default());
    let sched = SchedInfo::base_only(Cadence::Disabled).with_inc(every_ms(15));
    let (streamer, container) = build(source.clone(), sched);

    let token = CancellationToken::new();
    let handle = streamer.clone().update_data(token.clone()).unwrap();

    wait_for("incremental merges", || {
        container.get(&"hits".to_string()).map_or(false, |hits| hits >= 3)
    })
    .await;

    token.cancel();
    handle.await.unwrap();

    assert_eq!(source.base_opens.load(Ordering::SeqCst), 1);
    assert_eq!(container.get(&"gen".to_string()).unwrap(), 1);
    assert!(streamer.info().last_inc_time.is_some());
}

#[test]
fn test_failed_reload_keeps_serving() {
    let source = Arc::new(CountingSource::default());
    let (streamer, container) = build(source, SchedInfo::base_only(Cadence::Disabled));
    streamer.run_base_cycle();

    let bad = Arc::new(CountingSource::with_bad_records());
    let replacement: LoadStreamer<String, u64, u64> = LoadStreamer::new(
        StreamerConfig::new("bad", Cadence::Disabled),
        bad as Arc<dyn Source<String, u64>>,
    )
    .unwrap()
    .with_container(container.clone());

    let report = replacement.run_base_cycle();

    assert!(report.outcome.is_failed());
    assert_eq!(container.get(&"gen".to_string()).unwrap(), 1);
    assert_eq!(streamer.state(), StreamerState::Ready);
    assert_eq!(replacement.state(), StreamerState::Uninitialized);
}

#[tokio::test]
async fn test_cancelled_streamer_refuses_cycles() {
    let source = Arc::new(CountingSource::default());
    let (streamer, container) = build(source.clone(), SchedInfo::base_only(Cadence::Disabled));

    let token = CancellationToken::new();
    token.cancel();
    let handle = streamer.clone().update_data(token).unwrap();
    handle.await.unwrap();

    assert_eq!(streamer.state(), StreamerState::Cancelled);
    assert_eq!(container.get(&"gen".to_string()).unwrap(), 1);

    let report = streamer.run_base_cycle();
    assert!(matches!(
        report.outcome,
        LoadOutcome::Failed(StreamerError::Cancelled(_))
    ));
    assert_eq!(source.base_opens.load(Ordering::SeqCst), 1);
}
