//! Streamer health snapshot

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Lifecycle state of a streamer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamerState {
    /// Nothing published yet; lookups answer NotFound
    Uninitialized = 0,
    /// First base load in progress
    Bootstrapping = 1,
    /// Serving a published generation
    Ready = 2,
    /// Serving while a cycle runs
    Reloading = 3,
    /// Terminal; data stays readable, no more cycles
    Cancelled = 4,
}

impl StreamerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamerState::Uninitialized => "uninitialized",
            StreamerState::Bootstrapping => "bootstrapping",
            StreamerState::Ready => "ready",
            StreamerState::Reloading => "reloading",
            StreamerState::Cancelled => "cancelled",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => StreamerState::Uninitialized,
            1 => StreamerState::Bootstrapping,
            2 => StreamerState::Ready,
            3 => StreamerState::Reloading,
            _ => StreamerState::Cancelled,
        }
    }
}

impl fmt::Display for StreamerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Atomic cell holding a [`StreamerState`]. `Cancelled` is sticky.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(StreamerState::Uninitialized as u8))
    }

    pub(crate) fn get(&self) -> StreamerState {
        StreamerState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `next` unless already cancelled. Returns false if cancelled.
    pub(crate) fn transition(&self, next: StreamerState) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current == StreamerState::Cancelled as u8 {
                    None
                } else {
                    Some(next as u8)
                }
            })
            .is_ok()
    }

    pub(crate) fn cancel(&self) {
        self.0.store(StreamerState::Cancelled as u8, Ordering::Release);
    }
}

/// Health snapshot, built fresh on every query.
#[derive(Debug, Clone, Serialize)]
pub struct Info {
    pub name: String,
    pub state: StreamerState,
    /// Live entries in the container
    pub total_num: usize,
    /// Records pulled in the last cycle
    pub add_num: u64,
    /// Record errors in the last cycle
    pub error_num: u64,
    pub last_base_time: Option<DateTime<Utc>>,
    pub last_inc_time: Option<DateTime<Utc>>,
    #[serde(rename = "base_time_used_ms", serialize_with = "as_millis")]
    pub base_time_used: Duration,
    #[serde(rename = "inc_time_used_ms", serialize_with = "as_millis")]
    pub inc_time_used: Duration,
}

impl Info {
    /// JSON form used in log lines
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"name\":\"{}\"}}", self.name))
    }
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Mutable per-streamer counters behind `Info`.
#[derive(Debug, Clone, Default)]
pub(crate) struct CycleStatus {
    pub(crate) add_num: u64,
    pub(crate) error_num: u64,
    pub(crate) last_base_time: Option<DateTime<Utc>>,
    pub(crate) last_inc_time: Option<DateTime<Utc>>,
    pub(crate) base_time_used: Duration,
    pub(crate) inc_time_used: Duration,
}
