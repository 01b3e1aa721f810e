//! Provider registry for the Gantry sidecar
//!
//! Every pluggable backend (state stores, pub/sub buses, secret stores,
//! bindings, name resolvers, HTTP middleware, configuration stores) is
//! registered here as a named, versioned factory. The sidecar bootstrap
//! registers every supported backend once at startup; `create` calls hand
//! out fresh provider instances thereafter.

#![deny(missing_docs)]

pub mod capability;
pub mod hub;
pub mod registry;

pub use hub::RegistryHub;
pub use registry::{
    Category, MiddlewareEntry, MiddlewareRegistry, ProviderEntry, Registry, RegistryError,
};
