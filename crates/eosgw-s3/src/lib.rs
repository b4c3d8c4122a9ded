//! eosgw S3 - S3 translation backend
//!
//! This crate maps the S3 bucket/object surface onto the remote namespace:
//! buckets resolve to backing directories through the registry, objects are
//! files below them, and listings emulate S3 delimiter semantics on top of
//! directory traversal.

pub mod admin;
pub mod backend;
pub mod context;
pub mod eos;
pub mod error;
pub mod listing;
pub mod types;
pub mod xml;

#[cfg(test)]
pub(crate) mod fake;

// Re-exports
pub use admin::Admin;
pub use backend::S3Backend;
pub use context::RequestContext;
pub use eos::EosBackend;
pub use error::S3Error;
