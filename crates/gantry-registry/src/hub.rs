//! Aggregate of one registry per provider category
//!
//! The hub is the only registry object the sidecar bootstrap holds. The
//! bootstrap registers every supported backend once at startup, before any
//! `create` call; there is no dynamic registration afterwards.

use crate::capability::{
    ConfigurationStore, InputBinding, NameResolver, OutputBinding, PubSub, SecretStore, StateStore,
};
use crate::registry::{Category, MiddlewareRegistry, Registry};

/// One registry per provider category
pub struct RegistryHub {
    /// Secret store factories
    pub secret_stores: Registry<Box<dyn SecretStore>>,
    /// State store factories
    pub state_stores: Registry<Box<dyn StateStore>>,
    /// Pub/sub factories
    pub pubsubs: Registry<Box<dyn PubSub>>,
    /// Input binding factories
    pub input_bindings: Registry<Box<dyn InputBinding>>,
    /// Output binding factories
    pub output_bindings: Registry<Box<dyn OutputBinding>>,
    /// Name resolver factories
    pub name_resolvers: Registry<Box<dyn NameResolver>>,
    /// HTTP middleware factories
    pub http_middleware: MiddlewareRegistry,
    /// Configuration store factories
    pub configuration_stores: Registry<Box<dyn ConfigurationStore>>,
}

impl RegistryHub {
    /// Create a hub with empty registries for every category
    pub fn new() -> Self {
        Self {
            secret_stores: Registry::new(Category::SecretStore),
            state_stores: Registry::new(Category::State),
            pubsubs: Registry::new(Category::PubSub),
            input_bindings: Registry::new(Category::InputBinding),
            output_bindings: Registry::new(Category::OutputBinding),
            name_resolvers: Registry::new(Category::NameResolution),
            http_middleware: MiddlewareRegistry::new(),
            configuration_stores: Registry::new(Category::Configuration),
        }
    }
}

impl Default for RegistryHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Metadata, ProviderResult, ResolveRequest};
    use crate::registry::ProviderEntry;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StaticResolver;

    #[async_trait]
    impl NameResolver for StaticResolver {
        async fn init(&mut self, _metadata: Metadata) -> ProviderResult<()> {
            Ok(())
        }

        async fn resolve_id(&self, request: ResolveRequest) -> ProviderResult<String> {
            Ok(format!("{}.{}:{}", request.id, request.namespace, request.port))
        }
    }

    struct MapSecretStore;

    #[async_trait]
    impl SecretStore for MapSecretStore {
        async fn init(&mut self, _metadata: Metadata) -> ProviderResult<()> {
            Ok(())
        }

        async fn get_secret(
            &self,
            name: &str,
            _metadata: &HashMap<String, String>,
        ) -> ProviderResult<HashMap<String, String>> {
            Ok(HashMap::from([(name.to_string(), "value".to_string())]))
        }
    }

    #[tokio::test]
    async fn hub_categories_are_independent() {
        let mut hub = RegistryHub::new();
        hub.name_resolvers.register(vec![ProviderEntry::new("static", || {
            Box::new(StaticResolver) as Box<dyn NameResolver>
        })]);
        hub.secret_stores.register(vec![ProviderEntry::new("local", || {
            Box::new(MapSecretStore) as Box<dyn SecretStore>
        })]);

        // Each category resolves only under its own prefix
        assert!(hub.name_resolvers.has("nameresolution.static", "v1"));
        assert!(!hub.name_resolvers.has("secretstores.static", "v1"));
        assert!(hub.secret_stores.has("secretstores.local", ""));

        let resolver = hub.name_resolvers.create("nameresolution.static", "").unwrap();
        let addr = resolver
            .resolve_id(ResolveRequest {
                id: "orders".to_string(),
                namespace: "default".to_string(),
                port: 3500,
            })
            .await
            .unwrap();
        assert_eq!(addr, "orders.default:3500");
    }

    #[test]
    fn input_and_output_bindings_share_the_prefix() {
        let hub = RegistryHub::new();
        assert_eq!(hub.input_bindings.category().prefix(), "bindings");
        assert_eq!(hub.output_bindings.category().prefix(), "bindings");
    }
}
