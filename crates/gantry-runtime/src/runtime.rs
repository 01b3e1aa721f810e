//! Sidecar bootstrap
//!
//! Resolves component definitions through a loader, filters them by scope,
//! and instantiates providers through the registry hub. Registration of
//! factories happens entirely before `init_components`; creation never races
//! with registration.

use std::collections::HashMap;

use gantry_registry::capability::Metadata;
use gantry_registry::{RegistryError, RegistryHub};
use gantry_resources::Component;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::RuntimeConfig;
use crate::loader::ComponentLoader;

/// Errors surfaced during sidecar bootstrap
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Registry lookup or construction failure
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Loader or platform error
    #[error(transparent)]
    Common(#[from] gantry_common::Error),

    /// A provider failed to initialize
    #[error("initializing component {component}: {message}")]
    ProviderInit {
        /// Component name
        component: String,
        /// Underlying error text
        message: String,
    },
}

/// Providers instantiated from the loaded component definitions, keyed by
/// component name
#[derive(Default)]
pub struct InitializedProviders {
    /// Secret stores
    pub secret_stores: HashMap<String, Box<dyn gantry_registry::capability::SecretStore>>,
    /// State stores
    pub state_stores: HashMap<String, Box<dyn gantry_registry::capability::StateStore>>,
    /// Pub/sub buses
    pub pubsubs: HashMap<String, Box<dyn gantry_registry::capability::PubSub>>,
    /// Input bindings
    pub input_bindings: HashMap<String, Box<dyn gantry_registry::capability::InputBinding>>,
    /// Output bindings
    pub output_bindings: HashMap<String, Box<dyn gantry_registry::capability::OutputBinding>>,
    /// Configuration stores
    pub configuration_stores:
        HashMap<String, Box<dyn gantry_registry::capability::ConfigurationStore>>,
}

impl std::fmt::Debug for InitializedProviders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializedProviders")
            .field("secret_stores", &self.secret_stores.keys().collect::<Vec<_>>())
            .field("state_stores", &self.state_stores.keys().collect::<Vec<_>>())
            .field("pubsubs", &self.pubsubs.keys().collect::<Vec<_>>())
            .field("input_bindings", &self.input_bindings.keys().collect::<Vec<_>>())
            .field("output_bindings", &self.output_bindings.keys().collect::<Vec<_>>())
            .field(
                "configuration_stores",
                &self.configuration_stores.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// The sidecar runtime
pub struct Runtime {
    config: RuntimeConfig,
    hub: RegistryHub,
}

impl Runtime {
    /// Create a runtime over an already-populated registry hub
    pub fn new(config: RuntimeConfig, hub: RegistryHub) -> Self {
        Self { config, hub }
    }

    /// The runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Load definitions from `loader` and bring up a provider for each one.
    ///
    /// Components scoped to other apps are skipped. A component whose
    /// provider cannot be found or fails to initialize aborts bootstrap
    /// unless it is marked `ignoreErrors`.
    pub async fn init_components(
        &self,
        loader: &dyn ComponentLoader,
    ) -> Result<InitializedProviders, RuntimeError> {
        let components = loader.load().await?;
        info!(count = components.len(), "loaded component definitions");

        let mut providers = InitializedProviders::default();
        for component in components {
            if !component.in_scope(&self.config.app_id) {
                info!(
                    component = component.name(),
                    app_id = %self.config.app_id,
                    "component out of scope, skipping"
                );
                continue;
            }
            if let Err(e) = self.init_component(&component, &mut providers).await {
                if component.spec.ignore_errors {
                    warn!(component = component.name(), error = %e, "component init failed, ignoring");
                    continue;
                }
                return Err(e);
            }
        }
        Ok(providers)
    }

    async fn init_component(
        &self,
        component: &Component,
        providers: &mut InitializedProviders,
    ) -> Result<(), RuntimeError> {
        let name = component.name().to_string();
        let full_type = &component.spec.component_type;
        let version = &component.spec.version;
        let metadata = component_metadata(component);
        let init_err = |e: Box<dyn std::error::Error + Send + Sync>| RuntimeError::ProviderInit {
            component: name.clone(),
            message: e.to_string(),
        };

        match category_of(full_type) {
            Some("secretstores") => {
                let mut store = self.hub.secret_stores.create(full_type, version)?;
                store.init(metadata).await.map_err(init_err)?;
                providers.secret_stores.insert(name, store);
            }
            Some("state") => {
                let mut store = self.hub.state_stores.create(full_type, version)?;
                store.init(metadata).await.map_err(init_err)?;
                providers.state_stores.insert(name, store);
            }
            Some("pubsub") => {
                let mut bus = self.hub.pubsubs.create(full_type, version)?;
                bus.init(metadata).await.map_err(init_err)?;
                providers.pubsubs.insert(name, bus);
            }
            Some("bindings") => {
                // A binding type may be registered as input, output, or both
                let mut bound = false;
                if self.hub.input_bindings.has(full_type, version) {
                    let mut binding = self.hub.input_bindings.create(full_type, version)?;
                    binding.init(metadata.clone()).await.map_err(&init_err)?;
                    providers.input_bindings.insert(name.clone(), binding);
                    bound = true;
                }
                if self.hub.output_bindings.has(full_type, version) {
                    let mut binding = self.hub.output_bindings.create(full_type, version)?;
                    binding.init(metadata).await.map_err(&init_err)?;
                    providers.output_bindings.insert(name, binding);
                    bound = true;
                }
                if !bound {
                    // Surface the miss through the input registry's error
                    self.hub.input_bindings.create(full_type, version)?;
                }
            }
            Some("configuration") => {
                let mut store = self.hub.configuration_stores.create(full_type, version)?;
                store.init(metadata).await.map_err(init_err)?;
                providers.configuration_stores.insert(name, store);
            }
            Some("middleware") => {
                // Middleware is constructed per pipeline with its own
                // metadata bag, not instantiated at bootstrap
                info!(component = %name, r#type = %full_type, "middleware component registered for pipeline assembly");
            }
            _ => {
                warn!(component = %name, r#type = %full_type, "unknown component category, skipping");
            }
        }
        Ok(())
    }
}

/// The category prefix of a full provider type, e.g. `state` for
/// `state.redis`
fn category_of(full_type: &str) -> Option<&str> {
    full_type.split('.').next().filter(|s| !s.is_empty())
}

/// Flatten a component's metadata pairs into a provider metadata bag
fn component_metadata(component: &Component) -> Metadata {
    Metadata::from_pairs(
        component
            .spec
            .metadata
            .iter()
            .map(|item| (item.name.clone(), item.value.as_plain_string())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use clap::Parser;
    use gantry_common::Result as CommonResult;
    use gantry_registry::capability::{
        Metadata as ProviderMetadata, ProviderResult, StateFeature, StateItem, StateStore,
        TransactionalOperation,
    };
    use gantry_registry::ProviderEntry;
    use gantry_resources::{ComponentSpec, DynamicValue, MetadataItem};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct RecordingStore {
        inits: Arc<AtomicUsize>,
        fail_init: bool,
    }

    #[async_trait]
    impl StateStore for RecordingStore {
        async fn init(&mut self, metadata: ProviderMetadata) -> ProviderResult<()> {
            if self.fail_init {
                return Err("connection refused".into());
            }
            assert_eq!(
                metadata.properties.get("redisHost").map(String::as_str),
                Some("localhost:6379")
            );
            self.inits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn get(&self, _key: &str) -> ProviderResult<Option<StateItem>> {
            Ok(None)
        }
        async fn set(&self, _item: StateItem) -> ProviderResult<()> {
            Ok(())
        }
        async fn delete(&self, _key: &str, _etag: Option<String>) -> ProviderResult<()> {
            Ok(())
        }
        async fn bulk_get(&self, _keys: &[String]) -> ProviderResult<Vec<Option<StateItem>>> {
            Ok(Vec::new())
        }
        async fn bulk_set(&self, _items: Vec<StateItem>) -> ProviderResult<()> {
            Ok(())
        }
        async fn bulk_delete(&self, _keys: &[String]) -> ProviderResult<()> {
            Ok(())
        }
        async fn multi(&self, _operations: Vec<TransactionalOperation>) -> ProviderResult<()> {
            Ok(())
        }
        fn features(&self) -> Vec<StateFeature> {
            vec![StateFeature::Etag]
        }
    }

    struct FixedLoader(Vec<Component>);

    #[async_trait]
    impl ComponentLoader for FixedLoader {
        async fn load(&self) -> CommonResult<Vec<Component>> {
            Ok(self.0.clone())
        }
    }

    fn redis_component(name: &str) -> Component {
        Component::new(
            name,
            ComponentSpec {
                component_type: "state.redis".to_string(),
                version: "v1".to_string(),
                metadata: vec![MetadataItem {
                    name: "redisHost".to_string(),
                    value: DynamicValue::from_string("localhost:6379"),
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
    }

    fn runtime_with_redis(fail_init: bool, inits: Arc<AtomicUsize>) -> Runtime {
        let mut hub = RegistryHub::new();
        hub.state_stores.register(vec![ProviderEntry::new("redis", move || {
            Box::new(RecordingStore {
                inits: inits.clone(),
                fail_init,
            }) as Box<dyn StateStore>
        })]);
        let config = RuntimeConfig::parse_from(["gantryd", "--app-id", "orders"]);
        Runtime::new(config, hub)
    }

    #[tokio::test]
    async fn initializes_in_scope_components() {
        let inits = Arc::new(AtomicUsize::new(0));
        let runtime = runtime_with_redis(false, inits.clone());
        let loader = FixedLoader(vec![redis_component("statestore")]);

        let providers = runtime.init_components(&loader).await.unwrap();
        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert!(providers.state_stores.contains_key("statestore"));
    }

    #[tokio::test]
    async fn skips_components_scoped_to_other_apps() {
        let inits = Arc::new(AtomicUsize::new(0));
        let runtime = runtime_with_redis(false, inits.clone());
        let mut component = redis_component("statestore");
        component.spec.scopes = vec!["someone-else".to_string()];
        let loader = FixedLoader(vec![component]);

        let providers = runtime.init_components(&loader).await.unwrap();
        assert_eq!(inits.load(Ordering::SeqCst), 0);
        assert!(providers.state_stores.is_empty());
    }

    #[tokio::test]
    async fn missing_provider_aborts_bootstrap() {
        let inits = Arc::new(AtomicUsize::new(0));
        let runtime = runtime_with_redis(false, inits);
        let mut component = redis_component("mongostore");
        component.spec.component_type = "state.mongodb".to_string();
        let loader = FixedLoader(vec![component]);

        let err = runtime.init_components(&loader).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Registry(_)));
    }

    #[tokio::test]
    async fn ignore_errors_lets_bootstrap_continue() {
        let inits = Arc::new(AtomicUsize::new(0));
        let runtime = runtime_with_redis(true, inits);
        let mut failing = redis_component("flaky");
        failing.spec.ignore_errors = true;
        let loader = FixedLoader(vec![failing]);

        let providers = runtime.init_components(&loader).await.unwrap();
        assert!(providers.state_stores.is_empty());
    }

    #[tokio::test]
    async fn init_failure_without_ignore_errors_is_fatal() {
        let inits = Arc::new(AtomicUsize::new(0));
        let runtime = runtime_with_redis(true, inits);
        let loader = FixedLoader(vec![redis_component("flaky")]);

        let err = runtime.init_components(&loader).await.unwrap_err();
        assert!(matches!(err, RuntimeError::ProviderInit { .. }));
    }

    #[test]
    fn category_extraction() {
        assert_eq!(category_of("state.redis"), Some("state"));
        assert_eq!(category_of("middleware.http.uppercase"), Some("middleware"));
        assert_eq!(category_of(""), None);
    }
}
