//! Configuration types for eosgw
//!
//! The configuration is a read-only value built once at startup and threaded
//! through the constructors of the clients, the registry and the backend.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "EOSGW";

/// Root configuration for eosgw
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote namespace endpoints
    pub eos: EosConfig,
    /// Bucket registry configuration
    pub registry: RegistryConfig,
    /// S3 backend configuration
    pub s3: S3Config,
}

impl Config {
    /// Load configuration from a TOML file, then overlay `EOSGW__*`
    /// environment variables (`EOSGW__EOS__AUTHKEY` sets `eos.authkey`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        self.eos.validate()?;
        self.registry.validate()
    }
}

/// Endpoints and credentials of the remote namespace
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EosConfig {
    /// Metadata gRPC endpoint (e.g., "http://eos-mgm:50051")
    pub grpc_url: String,
    /// HTTP data endpoint (front door that redirects to data nodes)
    pub http_url: String,
    /// Shared key sent with every metadata and data request
    pub authkey: String,
    /// Value of the `x-forwarded-for` header on data requests
    pub forwarded_for: String,
}

impl Default for EosConfig {
    fn default() -> Self {
        Self {
            grpc_url: "http://localhost:50051".to_string(),
            http_url: "http://localhost:8000".to_string(),
            authkey: String::new(),
            forwarded_for: "dummy".to_string(),
        }
    }
}

impl EosConfig {
    fn validate(&self) -> Result<()> {
        for (name, url) in [("eos.grpc_url", &self.grpc_url), ("eos.http_url", &self.http_url)] {
            if url.is_empty() {
                return Err(Error::configuration(format!("{name} must not be empty")));
            }
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::configuration(format!(
                    "{name} must be an http(s) URL, got {url}"
                )));
            }
        }
        Ok(())
    }
}

/// Bucket registry driver
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryDriver {
    /// In-process maps, lost on restart
    #[default]
    Memory,
    /// Directory tree on the local filesystem
    Local,
}

/// Bucket registry configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Driver to use
    pub driver: RegistryDriver,
    /// Base folder for the local driver (empty = fresh temporary directory)
    pub folder: PathBuf,
}

impl RegistryConfig {
    fn validate(&self) -> Result<()> {
        if self.driver == RegistryDriver::Memory && !self.folder.as_os_str().is_empty() {
            return Err(Error::configuration(
                "registry.folder is only used by the local driver",
            ));
        }
        Ok(())
    }
}

/// S3 backend configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    /// Compute an MD5 ETag over uploaded bytes
    pub compute_md5: bool,
    /// Region name to return in responses
    pub region: String,
    /// Owner ID reported in bucket listings
    pub owner_id: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            compute_md5: false,
            region: "us-east-1".to_string(),
            owner_id: "eosgw".to_string(),
        }
    }
}
