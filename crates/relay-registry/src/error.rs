//! Error types for the instance registry.

use thiserror::Error;

use crate::types::InstanceId;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("instance id already registered: {0}")]
    DuplicateId(InstanceId),

    #[error("port {1} already assigned to instance {0}")]
    DuplicatePort(InstanceId, u16),

    #[error("instance not found: {0}")]
    NotFound(InstanceId),
}
