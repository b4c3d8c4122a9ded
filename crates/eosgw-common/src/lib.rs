//! eosgw Common - Shared types and utilities
//!
//! This crate provides the identity and bucket types, the configuration
//! tree and the configuration error type used by every eosgw component.

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, EosConfig, RegistryConfig, RegistryDriver, S3Config};
pub use error::{Error, Result};
pub use types::{Bucket, Identity};
