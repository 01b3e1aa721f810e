//! Gantry operator
//!
//! Watches component, configuration and subscription resources and serves
//! them to connected sidecars over gRPC. Component changes fan out to every
//! connected sidecar with secret references resolved inline just before
//! shipment.

#![deny(missing_docs)]

pub mod api;
pub mod secrets;
pub mod store;
pub mod tls;
pub mod watch;

pub use api::OperatorApi;
pub use store::{KubeStore, ResourceStore};
