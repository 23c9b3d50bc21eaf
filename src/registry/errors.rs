//! Registry errors

use thiserror::Error;

use crate::container::ContainerError;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Registry errors
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("streamer '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("streamer '{0}' not found")]
    StreamerNotFound(String),

    #[error("streamer '{0}' has no container")]
    NoContainer(String),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("registry lock poisoned")]
    Internal,
}

impl RegistryError {
    /// Stable error code for logs and CLI output
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::AlreadyRegistered(_) => "HOTDICT_ALREADY_REGISTERED",
            RegistryError::StreamerNotFound(_) => "HOTDICT_STREAMER_NOT_FOUND",
            RegistryError::NoContainer(_) => "HOTDICT_NO_CONTAINER",
            RegistryError::Container(e) => e.code(),
            RegistryError::Internal => "HOTDICT_INTERNAL",
        }
    }

    /// Whether the lookup reached a container and the key was absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::Container(ContainerError::NotFound))
    }
}
