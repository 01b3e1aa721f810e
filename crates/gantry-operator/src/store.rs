//! Cluster resource access behind a trait
//!
//! The API server reads configurations, components, subscriptions and
//! secrets. The seam exists so the fan-out and secret-resolution logic are
//! testable without a cluster; production uses [`KubeStore`] over a
//! `kube::Client`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use gantry_common::{Error, Result};
use gantry_resources::{Component, Configuration, Subscription, SUBSCRIPTION_API_VERSION_V2ALPHA1};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, ListParams};
use kube::Client;

/// A subscription as listed from the cluster, with its API version visible
/// for the storage-version filter
#[derive(Clone, Debug)]
pub struct ListedSubscription {
    /// API version the resource was stored at
    pub api_version: String,
    /// The subscription resource
    pub subscription: Subscription,
}

/// Cluster reads the operator API needs
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch one configuration resource
    async fn get_configuration(&self, namespace: &str, name: &str) -> Result<Configuration>;

    /// List all components in a namespace
    async fn list_components(&self, namespace: &str) -> Result<Vec<Component>>;

    /// List all subscriptions, any API version
    async fn list_subscriptions(&self) -> Result<Vec<ListedSubscription>>;

    /// Fetch a secret's data
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, Vec<u8>>>;
}

/// [`ResourceStore`] over a live cluster
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    /// Wrap a cluster client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get_configuration(&self, namespace: &str, name: &str) -> Result<Configuration> {
        let api: Api<Configuration> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn list_components(&self, namespace: &str) -> Result<Vec<Component>> {
        let api: Api<Component> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_subscriptions(&self) -> Result<Vec<ListedSubscription>> {
        // Typed access always yields the storage version
        let api: Api<Subscription> = Api::all(self.client.clone());
        Ok(api
            .list(&ListParams::default())
            .await?
            .items
            .into_iter()
            .map(|subscription| ListedSubscription {
                api_version: SUBSCRIPTION_API_VERSION_V2ALPHA1.to_string(),
                subscription,
            })
            .collect())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, Vec<u8>>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api
            .get(name)
            .await
            .map_err(|e| Error::secret_for(name, namespace, e.to_string()))?;
        Ok(secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, v.0))
            .collect())
    }
}

/// In-memory [`ResourceStore`] for tests
#[cfg(any(test, feature = "test-store"))]
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// A store backed by in-process maps
    #[derive(Default)]
    pub struct InMemoryStore {
        configurations: Mutex<HashMap<(String, String), Configuration>>,
        components: Mutex<HashMap<String, Vec<Component>>>,
        subscriptions: Mutex<Vec<ListedSubscription>>,
        secrets: Mutex<HashMap<(String, String), BTreeMap<String, Vec<u8>>>>,
    }

    impl InMemoryStore {
        /// Create an empty store
        pub fn new() -> Self {
            Self::default()
        }

        /// Insert a configuration
        pub fn put_configuration(&self, namespace: &str, configuration: Configuration) {
            let name = configuration
                .metadata
                .name
                .clone()
                .unwrap_or_default();
            self.configurations
                .lock()
                .unwrap()
                .insert((namespace.to_string(), name), configuration);
        }

        /// Insert a component into its namespace
        pub fn put_component(&self, namespace: &str, component: Component) {
            self.components
                .lock()
                .unwrap()
                .entry(namespace.to_string())
                .or_default()
                .push(component);
        }

        /// Insert a subscription at an explicit API version
        pub fn put_subscription(&self, api_version: &str, subscription: Subscription) {
            self.subscriptions.lock().unwrap().push(ListedSubscription {
                api_version: api_version.to_string(),
                subscription,
            });
        }

        /// Insert a secret
        pub fn put_secret(
            &self,
            namespace: &str,
            name: &str,
            data: BTreeMap<String, Vec<u8>>,
        ) {
            self.secrets
                .lock()
                .unwrap()
                .insert((namespace.to_string(), name.to_string()), data);
        }
    }

    #[async_trait]
    impl ResourceStore for InMemoryStore {
        async fn get_configuration(&self, namespace: &str, name: &str) -> Result<Configuration> {
            self.configurations
                .lock()
                .unwrap()
                .get(&(namespace.to_string(), name.to_string()))
                .cloned()
                .ok_or_else(|| {
                    Error::internal_with_context("store", format!("configuration {namespace}/{name} not found"))
                })
        }

        async fn list_components(&self, namespace: &str) -> Result<Vec<Component>> {
            Ok(self
                .components
                .lock()
                .unwrap()
                .get(namespace)
                .cloned()
                .unwrap_or_default())
        }

        async fn list_subscriptions(&self) -> Result<Vec<ListedSubscription>> {
            Ok(self.subscriptions.lock().unwrap().clone())
        }

        async fn get_secret(
            &self,
            namespace: &str,
            name: &str,
        ) -> Result<BTreeMap<String, Vec<u8>>> {
            self.secrets
                .lock()
                .unwrap()
                .get(&(namespace.to_string(), name.to_string()))
                .cloned()
                .ok_or_else(|| Error::secret_for(name, namespace, "secret not found"))
        }
    }
}
