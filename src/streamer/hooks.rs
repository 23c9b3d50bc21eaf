//! # Load hooks
//!
//! Seams where a source adapter customizes a cycle without the orchestrator
//! knowing its concrete type:
//! - before a cycle: supply load parameters, or veto the cycle
//! - after a cycle: observe the report

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::errors::StreamerError;
use crate::container::LoadStats;

/// Which kind of cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    Base,
    Inc,
}

impl LoadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadKind::Base => "base",
            LoadKind::Inc => "inc",
        }
    }
}

impl fmt::Display for LoadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decision of a before-load hook
#[derive(Debug, Clone, PartialEq)]
pub enum BeforeLoad {
    /// Run the cycle, optionally with source parameters (a query, a cursor position)
    Proceed(Option<Value>),
    /// Skip this cycle
    Veto,
}

/// How a cycle ended
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// Records applied; for base loads a new generation is live
    Applied(LoadStats),
    /// Source had nothing new
    Unchanged,
    /// A before-load hook vetoed the cycle
    Vetoed,
    /// Cycle failed; prior data keeps serving
    Failed(StreamerError),
}

impl LoadOutcome {
    /// True if the cycle ended in an error
    pub fn is_failed(&self) -> bool {
        matches!(self, LoadOutcome::Failed(_))
    }

    /// The error of a failed cycle
    pub fn error(&self) -> Option<&StreamerError> {
        match self {
            LoadOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// What one cycle did
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub cycle_id: Uuid,
    pub name: String,
    pub kind: LoadKind,
    pub outcome: LoadOutcome,
    /// Counts of the container pass (zero if no pass ran)
    pub stats: LoadStats,
    /// Attempts made, retries included
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// Callback run before a load
pub type BeforeHook = Arc<dyn Fn(LoadKind) -> BeforeLoad + Send + Sync>;
/// Callback run after a cycle
pub type AfterHook = Arc<dyn Fn(&LoadReport) + Send + Sync>;

/// Optional callbacks around load cycles
#[derive(Clone, Default)]
pub struct StreamerHooks {
    before_base: Option<BeforeHook>,
    before_inc: Option<BeforeHook>,
    after_base: Option<AfterHook>,
    after_inc: Option<AfterHook>,
}

impl StreamerHooks {
    /// No hooks: every cycle proceeds without parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs before each base load; may veto it or pass source parameters.
    pub fn before_base(mut self, f: impl Fn(LoadKind) -> BeforeLoad + Send + Sync + 'static) -> Self {
        self.before_base = Some(Arc::new(f));
        self
    }

    /// Runs before each incremental load.
    pub fn before_inc(mut self, f: impl Fn(LoadKind) -> BeforeLoad + Send + Sync + 'static) -> Self {
        self.before_inc = Some(Arc::new(f));
        self
    }

    /// Receives the report of each base cycle, failures included.
    pub fn after_base(mut self, f: impl Fn(&LoadReport) + Send + Sync + 'static) -> Self {
        self.after_base = Some(Arc::new(f));
        self
    }

    /// Receives the report of each incremental cycle.
    pub fn after_inc(mut self, f: impl Fn(&LoadReport) + Send + Sync + 'static) -> Self {
        self.after_inc = Some(Arc::new(f));
        self
    }

    pub(crate) fn before(&self, kind: LoadKind) -> BeforeLoad {
        let hook = match kind {
            LoadKind::Base => &self.before_base,
            LoadKind::Inc => &self.before_inc,
        };
        hook.as_ref()
            .map_or(BeforeLoad::Proceed(None), |f| f(kind))
    }

    pub(crate) fn after(&self, report: &LoadReport) {
        let hook = match report.kind {
            LoadKind::Base => &self.after_base,
            LoadKind::Inc => &self.after_inc,
        };
        if let Some(f) = hook {
            f(report);
        }
    }
}

impl fmt::Debug for StreamerHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamerHooks")
            .field("before_base", &self.before_base.is_some())
            .field("before_inc", &self.before_inc.is_some())
            .field("after_base", &self.after_base.is_some())
            .field("after_inc", &self.after_inc.is_some())
            .finish()
    }
}
