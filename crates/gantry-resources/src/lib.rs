//! Custom resource definitions for the Gantry control plane
//!
//! These are the units the operator watches and delivers to sidecars:
//! components (one backend provider configuration each), configurations
//! (runtime settings such as mTLS), and pub/sub subscriptions.

#![deny(missing_docs)]

pub mod component;
pub mod configuration;
pub mod subscription;

pub use component::{Component, ComponentAuth, ComponentSpec, DynamicValue, MetadataItem, SecretKeyRef};
pub use configuration::{Configuration, ConfigurationSpec, MetricSpec, MtlsSpec};
pub use subscription::{Routes, Rule, Subscription, SubscriptionSpec};

/// API version string of the storage (v2alpha1) subscription resources
pub const SUBSCRIPTION_API_VERSION_V2ALPHA1: &str = "gantry.dev/v2alpha1";

/// API version string of the legacy (v1alpha1) subscription resources
pub const SUBSCRIPTION_API_VERSION_V1ALPHA1: &str = "gantry.dev/v1alpha1";

/// Name of the built-in cluster secret store
pub const KUBERNETES_SECRET_STORE: &str = "kubernetes";
