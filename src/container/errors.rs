//! # Container Errors
//!
//! Three failure classes meet at the container boundary:
//! - `RecordError`: one record failed to decode, counted and skipped
//! - `SourceError`: the iterator itself cannot continue, aborts the pass
//! - `ContainerError`: what a container operation reports to its caller

use std::fmt;

use thiserror::Error;

use super::stats::LoadStats;

/// Result type for container operations
pub type ContainerResult<T> = Result<T, ContainerError>;

/// A single record failed to decode or apply.
///
/// Never fatal on its own; only the aggregate ratio matters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record error: {message}")]
pub struct RecordError {
    message: String,
}

impl RecordError {
    /// Create a new record error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Get the message
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Classification of a source failure, used by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Connection to the source was lost or never established
    Connectivity,
    /// Local I/O failure while reading the source
    Io,
    /// The source rejected the query or returned something unusable
    Query,
}

impl SourceErrorKind {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceErrorKind::Connectivity => "connectivity",
            SourceErrorKind::Io => "io",
            SourceErrorKind::Query => "query",
        }
    }
}

impl fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The record iterator cannot proceed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("source error ({kind}): {message}")]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    /// Create a new source error
    pub fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Connection lost or unreachable
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Connectivity, message)
    }

    /// Read failure
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Io, message)
    }

    /// Source rejected the request
    pub fn query(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Query, message)
    }

    /// Get the kind
    pub fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    /// Get the message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether a fresh attempt against the source may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            SourceErrorKind::Connectivity | SourceErrorKind::Io
        )
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::io(err.to_string())
    }
}

/// Errors reported by container operations
#[derive(Debug, Clone, Error)]
pub enum ContainerError {
    #[error("key not found")]
    NotFound,

    #[error("operation not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("load aborted: {0}")]
    Source(#[from] SourceError),

    #[error("tolerance exceeded: error ratio {ratio:.4} > tolerance {tolerance:.4} ({stats})")]
    ToleranceExceeded {
        ratio: f64,
        tolerance: f64,
        stats: LoadStats,
    },
}

impl ContainerError {
    /// Stable error code for logs and CLI output
    pub fn code(&self) -> &'static str {
        match self {
            ContainerError::NotFound => "HOTDICT_NOT_FOUND",
            ContainerError::NotImplemented(_) => "HOTDICT_NOT_IMPLEMENTED",
            ContainerError::Source(_) => "HOTDICT_SOURCE_ERROR",
            ContainerError::ToleranceExceeded { .. } => "HOTDICT_TOLERANCE_EXCEEDED",
        }
    }

    /// Whether this is an ordinary lookup miss
    pub fn is_not_found(&self) -> bool {
        matches!(self, ContainerError::NotFound)
    }

    /// The source failure behind this error, if any
    pub fn source_error(&self) -> Option<&SourceError> {
        match self {
            ContainerError::Source(e) => Some(e),
            _ => None,
        }
    }
}
