//! Streamer configuration
//!
//! Immutable after the streamer is built. Tolerance lives on the container,
//! everything about cadence and retries lives here.

use std::time::Duration;

use super::errors::{StreamerError, StreamerResult};
use super::sched::{Cadence, SchedInfo};

/// Configuration of one load streamer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamerConfig {
    /// Registry name, also used in every log line
    pub name: String,

    pub sched: SchedInfo,

    /// Extra attempts after a connectivity failure (0 = no retry)
    pub retries: u32,

    /// Pause between attempts
    pub retry_backoff: Duration,
}

impl StreamerConfig {
    /// Base reloads on `base`, synchronous bootstrap, no retries.
    pub fn new(name: impl Into<String>, base: Cadence) -> Self {
        Self {
            name: name.into(),
            sched: SchedInfo::base_only(base),
            retries: 0,
            retry_backoff: default_retry_backoff(),
        }
    }

    pub fn with_sched(mut self, sched: SchedInfo) -> Self {
        self.sched = sched;
        self
    }

    pub fn with_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.retries = retries;
        self.retry_backoff = backoff;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> StreamerResult<()> {
        if self.name.trim().is_empty() {
            return Err(StreamerError::config("streamer name must not be empty"));
        }
        self.sched.validate()
    }
}

fn default_retry_backoff() -> Duration {
    Duration::from_secs(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StreamerConfig::new("geo", Cadence::every_secs(60));
        assert!(config.sched.sync_bootstrap);
        assert!(config.sched.inc.is_disabled());
        assert_eq!(config.retries, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        let config = StreamerConfig::new("  ", Cadence::Disabled);
        assert!(matches!(config.validate(), Err(StreamerError::Config(_))));
    }

    #[test]
    fn test_invalid_sched_rejected() {
        let config = StreamerConfig::new("geo", Cadence::Every(Duration::ZERO));
        assert!(config.validate().is_err());
    }
}
