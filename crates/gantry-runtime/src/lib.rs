//! Gantry sidecar runtime
//!
//! The runtime loads component definitions (from a local directory in
//! standalone mode, or from the operator over gRPC in cluster mode), filters
//! them by scope, and instantiates backend providers through the
//! [`gantry_registry::RegistryHub`].

#![deny(missing_docs)]

pub mod client;
pub mod config;
pub mod loader;
pub mod runtime;

pub use config::RuntimeConfig;
pub use runtime::{Runtime, RuntimeError};
