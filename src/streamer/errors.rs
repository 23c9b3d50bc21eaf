//! # Streamer Errors

use thiserror::Error;

use crate::container::{ContainerError, SourceError};

/// Result type for streamer operations
pub type StreamerResult<T> = Result<T, StreamerError>;

/// Streamer errors
#[derive(Debug, Clone, Error)]
pub enum StreamerError {
    /// Bad configuration or unreachable source at construction time
    #[error("configuration error: {0}")]
    Config(String),

    #[error("no container bound to streamer '{0}'")]
    NoContainer(String),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("streamer '{0}' is cancelled")]
    Cancelled(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl StreamerError {
    /// Config error
    pub fn config(msg: impl Into<String>) -> Self {
        StreamerError::Config(msg.into())
    }

    /// Whether the orchestrator should retry the cycle.
    ///
    /// Only connectivity-class source failures qualify; record and tolerance
    /// failures would repeat identically.
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamerError::Source(e) => e.is_retryable(),
            StreamerError::Container(ContainerError::Source(e)) => e.is_retryable(),
            _ => false,
        }
    }

    /// Stable error code for logs and CLI output
    pub fn code(&self) -> &'static str {
        match self {
            StreamerError::Config(_) => "HOTDICT_CONFIG_ERROR",
            StreamerError::NoContainer(_) => "HOTDICT_NO_CONTAINER",
            StreamerError::Container(e) => e.code(),
            StreamerError::Source(_) => "HOTDICT_SOURCE_ERROR",
            StreamerError::Cancelled(_) => "HOTDICT_CANCELLED",
            StreamerError::Runtime(_) => "HOTDICT_RUNTIME_ERROR",
        }
    }
}
