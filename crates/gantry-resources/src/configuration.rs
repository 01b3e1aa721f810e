//! Configuration CRD: cluster-wide runtime settings
//!
//! The control plane consults the configuration named `gantry-system` for
//! platform-level toggles; sidecars fetch their own configuration by name.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Name of the platform configuration resource
pub const SYSTEM_CONFIGURATION_NAME: &str = "gantry-system";

/// Spec for a Configuration resource
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "gantry.dev",
    version = "v1alpha1",
    kind = "Configuration",
    plural = "configurations",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSpec {
    /// Mutual-TLS settings for sidecar-to-control-plane traffic
    #[serde(default)]
    pub mtls: MtlsSpec,

    /// Metric collection settings
    #[serde(default)]
    pub metric: MetricSpec,
}

/// Mutual-TLS settings
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MtlsSpec {
    /// Whether workload mTLS is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MtlsSpec {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Metric collection settings
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricSpec {
    /// Whether metric collection is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricSpec {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}
