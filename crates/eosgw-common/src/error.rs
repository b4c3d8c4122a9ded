//! Error types shared by eosgw components

use thiserror::Error;

/// Common result type for eosgw setup operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
