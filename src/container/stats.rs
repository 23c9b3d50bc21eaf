//! Load pass accounting and the tolerance gate

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::errors::{ContainerError, ContainerResult};

/// Counts accumulated across one load pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadStats {
    /// Records pulled from the iterator, good or bad
    pub total: u64,
    /// Records that failed to decode or apply
    pub errors: u64,
}

impl LoadStats {
    /// Error ratio of the pass. An empty pass has ratio 0.
    pub fn error_ratio(&self) -> f64 {
        self.errors as f64 / self.total.max(1) as f64
    }

    /// Records that were applied
    pub fn applied(&self) -> u64 {
        self.total - self.errors
    }
}

impl fmt::Display for LoadStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "total={}, errors={}", self.total, self.errors)
    }
}

/// Maximum fraction of record errors a pass may absorb.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Tolerance(f64);

impl Tolerance {
    /// Rejects every pass with at least one record error.
    pub const STRICT: Tolerance = Tolerance(0.0);

    /// Create a tolerance; `None` if outside `[0, 1]` or NaN.
    pub fn new(ratio: f64) -> Option<Self> {
        if (0.0..=1.0).contains(&ratio) {
            Some(Self(ratio))
        } else {
            None
        }
    }

    /// Get the ratio
    pub fn ratio(&self) -> f64 {
        self.0
    }

    /// Reject the pass if its error ratio is above the tolerance.
    pub fn check(&self, stats: LoadStats) -> ContainerResult<()> {
        let ratio = stats.error_ratio();
        if ratio > self.0 {
            return Err(ContainerError::ToleranceExceeded {
                ratio,
                tolerance: self.0,
                stats,
            });
        }
        Ok(())
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::STRICT
    }
}

/// Live counters for the pass in progress.
///
/// Readers may observe the counters mid-pass; values are best-effort.
#[derive(Debug, Default)]
pub(crate) struct PassCounter {
    total: AtomicU64,
    errors: AtomicU64,
}

impl PassCounter {
    pub(crate) fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
    }

    pub(crate) fn record_ok(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_err(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> LoadStats {
        LoadStats {
            total: self.total.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}
