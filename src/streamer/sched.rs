//! # Reload cadence
//!
//! A cadence answers one question: how long until the next cycle.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use croner::Cron;

use super::errors::{StreamerError, StreamerResult};

/// When a kind of load cycle runs
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Cadence {
    /// Never runs on its own
    #[default]
    Disabled,
    /// Fixed delay after the previous cycle finished
    Every(Duration),
    /// Next matching time of a cron expression (UTC)
    Cron(String),
}

impl Cadence {
    /// Fixed interval in seconds; zero disables.
    pub fn every_secs(secs: u64) -> Self {
        if secs == 0 {
            Cadence::Disabled
        } else {
            Cadence::Every(Duration::from_secs(secs))
        }
    }

    /// Cron cadence; the expression is validated here.
    pub fn cron(expr: impl Into<String>) -> StreamerResult<Self> {
        let expr = expr.into();
        parse_cron(&expr)?;
        Ok(Cadence::Cron(expr))
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, Cadence::Disabled)
    }

    /// Delay from `now` until the next cycle, `None` if disabled.
    pub fn next_delay(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            Cadence::Disabled => None,
            Cadence::Every(interval) => Some(*interval),
            Cadence::Cron(expr) => {
                let next = parse_cron(expr).ok()?.find_next_occurrence(&now, false).ok()?;
                Some((next - now).to_std().unwrap_or(Duration::ZERO))
            }
        }
    }

    pub(crate) fn validate(&self) -> StreamerResult<()> {
        match self {
            Cadence::Every(interval) if interval.is_zero() => Err(StreamerError::config(
                "interval cadence must be greater than zero",
            )),
            Cadence::Cron(expr) => parse_cron(expr).map(|_| ()),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Disabled => write!(f, "disabled"),
            Cadence::Every(interval) => write!(f, "every {}ms", interval.as_millis()),
            Cadence::Cron(expr) => write!(f, "cron '{}'", expr),
        }
    }
}

fn parse_cron(expr: &str) -> StreamerResult<Cron> {
    Cron::new(expr)
        .parse()
        .map_err(|e| StreamerError::config(format!("invalid cron expression '{}': {}", expr, e)))
}

/// Scheduling preferences of a streamer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchedInfo {
    /// Cadence of full reloads
    pub base: Cadence,
    /// Cadence of incremental merges
    pub inc: Cadence,
    /// Run the first base load inside `update_data` before returning
    pub sync_bootstrap: bool,
}

impl SchedInfo {
    /// Base reloads only
    pub fn base_only(base: Cadence) -> Self {
        Self {
            base,
            inc: Cadence::Disabled,
            sync_bootstrap: true,
        }
    }

    pub fn with_inc(mut self, inc: Cadence) -> Self {
        self.inc = inc;
        self
    }

    pub fn with_sync_bootstrap(mut self, sync_bootstrap: bool) -> Self {
        self.sync_bootstrap = sync_bootstrap;
        self
    }

    pub(crate) fn validate(&self) -> StreamerResult<()> {
        self.base.validate()?;
        self.inc.validate()
    }
}
