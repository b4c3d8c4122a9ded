//! eosgw Protocol - gRPC definitions for the EOS namespace service
//!
//! This crate contains the protobuf-generated messages and client for the
//! `eos.rpc.Eos` service: metadata lookup (`MD`), directory traversal
//! (`Find`) and namespace mutation (`Exec`).

/// EOS namespace service
pub mod rpc {
    tonic::include_proto!("eos.rpc");
}
