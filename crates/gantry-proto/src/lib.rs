//! Protocol buffer definitions for the Gantry operator API.
//!
//! This crate provides the gRPC service and message definitions for
//! communication between sidecars and the operator. The operator fans
//! component changes out to every connected sidecar over the
//! `ComponentUpdate` server stream; list/get calls serve the initial load.
//!
//! Payloads are opaque `bytes` fields carrying the JSON serialization of the
//! corresponding resource. Each blob is deserialized independently on the
//! receiving side so a single malformed definition never poisons a batch.

// Generated protobuf code doesn't have docs
#![allow(missing_docs)]

/// Generated protobuf types from operator.proto
pub mod operator {
    /// Version 1 of the operator protocol
    pub mod v1 {
        tonic::include_proto!("gantry.operator.v1");
    }
}

pub use operator::v1::*;
