//! Registry error types

use thiserror::Error;

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("bucket already exists: {0}")]
    AlreadyExists(String),

    #[error("no such bucket: {0}")]
    NotFound(String),

    #[error("invalid bucket name: {0:?}")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
