//! Component definition loaders
//!
//! Two sources behind one contract: a directory of YAML manifests
//! (standalone mode) and the operator's gRPC API (cluster mode). Both treat
//! a malformed definition as recoverable: the item is logged and skipped,
//! never failing the batch.

pub mod cluster;
pub mod standalone;

use async_trait::async_trait;
use gantry_resources::Component;

pub use cluster::ClusterLoader;
pub use standalone::StandaloneLoader;

/// A leaf source of component definitions
#[async_trait]
pub trait ComponentLoader: Send + Sync {
    /// Load every component definition currently visible to this source
    async fn load(&self) -> gantry_common::Result<Vec<Component>>;
}
