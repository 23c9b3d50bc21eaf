//! Observable events
//!
//! Every lifecycle transition of a streamer is one of these.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Synchronous bootstrap load begins
    BootstrapBegin,
    /// Bootstrap failed, nothing was published
    BootstrapFailed,
    /// Background refresh loop started
    RefreshLoopStart,
    /// Cancellation observed, refresh loop exited
    StreamerCancelled,

    // Base loads
    /// Base load cycle begins
    BaseLoadBegin,
    /// Base load published a new generation
    BaseLoadComplete,
    /// Base load failed, previous generation kept
    BaseLoadFailed,
    /// Base cycle skipped (hook veto or source had nothing new)
    BaseLoadSkipped,

    // Incremental loads
    /// Incremental cycle begins
    IncLoadBegin,
    /// Incremental cycle applied
    IncLoadComplete,
    /// Incremental cycle failed
    IncLoadFailed,
    /// Incremental cycle skipped
    IncLoadSkipped,

    /// A connectivity failure is being retried
    LoadRetry,

    // Registry
    /// Streamer registered under a name
    StreamerRegistered,

    /// Configuration loaded
    ConfigLoaded,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootstrapBegin => "BOOTSTRAP_BEGIN",
            Event::BootstrapFailed => "BOOTSTRAP_FAILED",
            Event::RefreshLoopStart => "REFRESH_LOOP_START",
            Event::StreamerCancelled => "STREAMER_CANCELLED",

            Event::BaseLoadBegin => "BASE_LOAD_BEGIN",
            Event::BaseLoadComplete => "BASE_LOAD_COMPLETE",
            Event::BaseLoadFailed => "BASE_LOAD_FAILED",
            Event::BaseLoadSkipped => "BASE_LOAD_SKIPPED",

            Event::IncLoadBegin => "INC_LOAD_BEGIN",
            Event::IncLoadComplete => "INC_LOAD_COMPLETE",
            Event::IncLoadFailed => "INC_LOAD_FAILED",
            Event::IncLoadSkipped => "INC_LOAD_SKIPPED",

            Event::LoadRetry => "LOAD_RETRY",

            Event::StreamerRegistered => "STREAMER_REGISTERED",

            Event::ConfigLoaded => "CONFIG_LOADED",
        }
    }

    /// Returns true if this event reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::BootstrapFailed | Event::BaseLoadFailed | Event::IncLoadFailed
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
