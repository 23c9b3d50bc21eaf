//! # Load orchestrator
//!
//! Binds a container to a [`Source`] and drives its cycles:
//! - optional synchronous bootstrap inside `update_data`
//! - a background tokio task ticking base and incremental cadences
//! - bounded retries on connectivity failures
//! - cancellation observed only between cycles
//!
//! Cycles run on the blocking pool because record iterators block. The
//! synchronous bootstrap runs on the caller's thread; on a multi-threaded
//! runtime it is wrapped in `block_in_place`, on a current-thread runtime it
//! stalls every other task until it returns.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;
use tokio::runtime::RuntimeFlavor;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::config::StreamerConfig;
use super::errors::{StreamerError, StreamerResult};
use super::hooks::{BeforeLoad, LoadKind, LoadOutcome, LoadReport, StreamerHooks};
use super::info::{CycleStatus, Info, StateCell, StreamerState};
use super::sched::{Cadence, SchedInfo};
use super::source::Source;
use super::{SharedContainer, Streamer};
use crate::container::{Container, Key, LoadStats, Value as ContainerValue};
use crate::observability::{log_event_with_fields, Event};

/// The standard [`Streamer`]: container + source + schedule.
pub struct LoadStreamer<K, V, O> {
    config: StreamerConfig,
    source: Arc<dyn Source<K, V>>,
    container: RwLock<Option<SharedContainer<K, V, O>>>,
    hooks: StreamerHooks,
    state: StateCell,
    status: RwLock<CycleStatus>,
    cycle: Mutex<()>,
}

impl<K, V, O> LoadStreamer<K, V, O>
where
    K: Key,
    V: ContainerValue,
    O: 'static,
{
    /// Create a streamer. Invalid configuration is rejected here.
    pub fn new(config: StreamerConfig, source: Arc<dyn Source<K, V>>) -> StreamerResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            container: RwLock::new(None),
            hooks: StreamerHooks::default(),
            state: StateCell::new(),
            status: RwLock::new(CycleStatus::default()),
            cycle: Mutex::new(()),
        })
    }

    /// Bind the container that receives every load.
    pub fn with_container(self, container: SharedContainer<K, V, O>) -> Self {
        self.set_container(container);
        self
    }

    /// Install load hooks, replacing any set before.
    pub fn with_hooks(mut self, hooks: StreamerHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// The validated configuration
    pub fn config(&self) -> &StreamerConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> StreamerState {
        self.state.get()
    }

    /// Run one base cycle on the calling thread.
    pub fn run_base_cycle(&self) -> LoadReport {
        self.run_cycle(LoadKind::Base)
    }

    /// Run one incremental cycle on the calling thread.
    pub fn run_inc_cycle(&self) -> LoadReport {
        self.run_cycle(LoadKind::Inc)
    }

    fn run_cycle(&self, kind: LoadKind) -> LoadReport {
        // Manual cycles and the background loop never overlap.
        let _cycle = self.cycle.lock().unwrap_or_else(PoisonError::into_inner);

        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        let timer = Instant::now();

        let prior = self.state.get();
        let running = match prior {
            StreamerState::Uninitialized | StreamerState::Bootstrapping => {
                StreamerState::Bootstrapping
            }
            _ => StreamerState::Reloading,
        };

        let (outcome, attempts) = if self.state.transition(running) {
            self.log_cycle(Self::begin_event(kind), cycle_id, &[]);
            match self.hooks.before(kind) {
                BeforeLoad::Veto => (LoadOutcome::Vetoed, 0),
                BeforeLoad::Proceed(params) => self.load_with_retry(kind, params.as_ref(), cycle_id),
            }
        } else {
            (
                LoadOutcome::Failed(StreamerError::Cancelled(self.config.name.clone())),
                0,
            )
        };

        let elapsed = timer.elapsed();
        let stats = match &outcome {
            LoadOutcome::Applied(stats) => *stats,
            LoadOutcome::Failed(_) => self.container_stats(),
            LoadOutcome::Unchanged | LoadOutcome::Vetoed => LoadStats::default(),
        };

        self.record_status(kind, started_at, elapsed, &outcome, stats);
        self.settle_state(kind, prior, &outcome);

        let report = LoadReport {
            cycle_id,
            name: self.config.name.clone(),
            kind,
            outcome,
            stats,
            attempts,
            started_at,
            elapsed,
        };
        self.log_report(&report);
        self.hooks.after(&report);
        report
    }

    fn load_with_retry(
        &self,
        kind: LoadKind,
        params: Option<&Value>,
        cycle_id: Uuid,
    ) -> (LoadOutcome, u32) {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.load_once(kind, params) {
                Ok(Some(stats)) => return (LoadOutcome::Applied(stats), attempt),
                Ok(None) => return (LoadOutcome::Unchanged, attempt),
                Err(err) if err.is_retryable() && attempt <= self.config.retries => {
                    let attempt_str = attempt.to_string();
                    let error = err.to_string();
                    self.log_cycle(
                        Event::LoadRetry,
                        cycle_id,
                        &[("attempt", attempt_str.as_str()), ("error", error.as_str())],
                    );
                    std::thread::sleep(self.config.retry_backoff);
                }
                Err(err) => return (LoadOutcome::Failed(err), attempt),
            }
        }
    }

    fn load_once(&self, kind: LoadKind, params: Option<&Value>) -> StreamerResult<Option<LoadStats>> {
        let container = self
            .container()
            .ok_or_else(|| StreamerError::NoContainer(self.config.name.clone()))?;

        let iter = match kind {
            LoadKind::Base => self.source.open_base(params)?,
            LoadKind::Inc => self.source.open_inc(params)?,
        };
        let Some(mut iter) = iter else {
            return Ok(None);
        };

        let stats = match kind {
            LoadKind::Base => container.load_base(iter.as_mut())?,
            LoadKind::Inc => container.load_inc(iter.as_mut())?,
        };
        Ok(Some(stats))
    }

    fn container_stats(&self) -> LoadStats {
        self.container()
            .map(|c| c.last_stats())
            .unwrap_or_default()
    }

    fn record_status(
        &self,
        kind: LoadKind,
        started_at: chrono::DateTime<Utc>,
        elapsed: Duration,
        outcome: &LoadOutcome,
        stats: LoadStats,
    ) {
        if let Ok(mut status) = self.status.write() {
            match kind {
                LoadKind::Base => {
                    status.last_base_time = Some(started_at);
                    status.base_time_used = elapsed;
                }
                LoadKind::Inc => {
                    status.last_inc_time = Some(started_at);
                    status.inc_time_used = elapsed;
                }
            }
            if matches!(outcome, LoadOutcome::Applied(_) | LoadOutcome::Failed(_)) {
                status.add_num = stats.total;
                status.error_num = stats.errors;
            }
        }
    }

    fn settle_state(&self, kind: LoadKind, prior: StreamerState, outcome: &LoadOutcome) {
        let published = kind == LoadKind::Base && matches!(outcome, LoadOutcome::Applied(_));
        let next = match prior {
            _ if published => StreamerState::Ready,
            StreamerState::Ready | StreamerState::Reloading => StreamerState::Ready,
            _ => StreamerState::Uninitialized,
        };
        self.state.transition(next);
    }

    fn begin_event(kind: LoadKind) -> Event {
        match kind {
            LoadKind::Base => Event::BaseLoadBegin,
            LoadKind::Inc => Event::IncLoadBegin,
        }
    }

    fn outcome_event(kind: LoadKind, outcome: &LoadOutcome) -> Event {
        match (kind, outcome) {
            (LoadKind::Base, LoadOutcome::Applied(_)) => Event::BaseLoadComplete,
            (LoadKind::Base, LoadOutcome::Failed(_)) => Event::BaseLoadFailed,
            (LoadKind::Base, _) => Event::BaseLoadSkipped,
            (LoadKind::Inc, LoadOutcome::Applied(_)) => Event::IncLoadComplete,
            (LoadKind::Inc, LoadOutcome::Failed(_)) => Event::IncLoadFailed,
            (LoadKind::Inc, _) => Event::IncLoadSkipped,
        }
    }

    fn log_cycle(&self, event: Event, cycle_id: Uuid, extra: &[(&str, &str)]) {
        let cycle = cycle_id.to_string();
        let mut fields = vec![
            ("name", self.config.name.as_str()),
            ("source", self.source.kind()),
            ("cycle_id", cycle.as_str()),
        ];
        fields.extend_from_slice(extra);
        log_event_with_fields(event, &fields);
    }

    fn log_report(&self, report: &LoadReport) {
        let event = Self::outcome_event(report.kind, &report.outcome);
        let info = self.info().to_json();
        let attempts = report.attempts.to_string();
        let elapsed_ms = report.elapsed.as_millis().to_string();
        let error = report.outcome.error().map(|e| e.to_string());

        let mut fields = vec![
            ("attempts", attempts.as_str()),
            ("elapsed_ms", elapsed_ms.as_str()),
            ("streamer_info", info.as_str()),
        ];
        if let Some(error) = &error {
            fields.push(("error", error.as_str()));
        }
        self.log_cycle(event, report.cycle_id, &fields);
    }

    /// Background loop: tick cadences until `token` fires.
    async fn refresh_loop(self: Arc<Self>, token: CancellationToken, base_first: bool) {
        log_event_with_fields(
            Event::RefreshLoopStart,
            &[("name", self.config.name.as_str())],
        );

        if base_first && !token.is_cancelled() {
            self.spawn_cycle(LoadKind::Base).await;
        }

        let sched = self.sched_info();
        let mut next_base = deadline(&sched.base);
        let mut next_inc = deadline(&sched.inc);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = sleep_until(next_inc) => {
                    self.spawn_cycle(LoadKind::Inc).await;
                    next_inc = deadline(&sched.inc);
                }
                _ = sleep_until(next_base) => {
                    self.spawn_cycle(LoadKind::Base).await;
                    next_base = deadline(&sched.base);
                }
            }
        }

        self.state.cancel();
        log_event_with_fields(
            Event::StreamerCancelled,
            &[("name", self.config.name.as_str())],
        );
    }

    async fn spawn_cycle(self: &Arc<Self>, kind: LoadKind) {
        let streamer = Arc::clone(self);
        if let Err(e) = tokio::task::spawn_blocking(move || streamer.run_cycle(kind)).await {
            let event = match kind {
                LoadKind::Base => Event::BaseLoadFailed,
                LoadKind::Inc => Event::IncLoadFailed,
            };
            let error = e.to_string();
            log_event_with_fields(
                event,
                &[("name", self.config.name.as_str()), ("error", error.as_str())],
            );
        }
    }
}

fn deadline(cadence: &Cadence) -> Option<tokio::time::Instant> {
    cadence
        .next_delay(Utc::now())
        .map(|delay| tokio::time::Instant::now() + delay)
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

impl<K, V, O> Streamer<K, V, O> for LoadStreamer<K, V, O>
where
    K: Key,
    V: ContainerValue,
    O: 'static,
{
    fn name(&self) -> &str {
        &self.config.name
    }

    fn set_container(&self, container: SharedContainer<K, V, O>) {
        if let Ok(mut slot) = self.container.write() {
            *slot = Some(container);
        }
    }

    fn container(&self) -> Option<SharedContainer<K, V, O>> {
        self.container.read().ok().and_then(|slot| slot.clone())
    }

    fn sched_info(&self) -> SchedInfo {
        self.config.sched.clone()
    }

    fn update_data(self: Arc<Self>, token: CancellationToken) -> StreamerResult<JoinHandle<()>> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| StreamerError::Runtime(format!("update_data needs a tokio runtime: {}", e)))?;

        let sync_bootstrap = self.config.sched.sync_bootstrap;
        if sync_bootstrap {
            log_event_with_fields(
                Event::BootstrapBegin,
                &[("name", self.config.name.as_str())],
            );
            // The calling worker hands its other tasks off while the load blocks.
            // A current-thread runtime has no one to hand off to.
            let report = match runtime.runtime_flavor() {
                RuntimeFlavor::CurrentThread => self.run_base_cycle(),
                _ => tokio::task::block_in_place(|| self.run_base_cycle()),
            };
            if let LoadOutcome::Failed(err) = report.outcome {
                let error = err.to_string();
                log_event_with_fields(
                    Event::BootstrapFailed,
                    &[("name", self.config.name.as_str()), ("error", error.as_str())],
                );
                return Err(err);
            }
        }

        Ok(runtime.spawn(self.refresh_loop(token, !sync_bootstrap)))
    }

    fn info(&self) -> Info {
        let status = self
            .status
            .read()
            .map(|s| s.clone())
            .unwrap_or_default();

        Info {
            name: self.config.name.clone(),
            state: self.state.get(),
            total_num: self.container().map(|c| c.len()).unwrap_or(0),
            add_num: status.add_num,
            error_num: status.error_num,
            last_base_time: status.last_base_time,
            last_inc_time: status.last_inc_time,
            base_time_used: status.base_time_used,
            inc_time_used: status.inc_time_used,
        }
    }
}
