//! Name+version keyed factory registry
//!
//! Providers register under `"<prefix>.<name>"` or `"<prefix>.<name>/<version>"`
//! keys, all lowercase. Lookup is case-insensitive; the versions `""`, `v0`
//! and `v1` are the "initial" version and share the bare-name slot, so a
//! provider's first stable iteration needs no explicit version while later
//! versions coexist under `name/vN` keys.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::capability::{HttpMiddleware, Metadata, ProviderError};

/// Provider category; each carries its external name prefix
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    /// Secret stores (`secretstores.*`)
    SecretStore,
    /// State stores (`state.*`)
    State,
    /// Pub/sub buses (`pubsub.*`)
    PubSub,
    /// Input bindings (`bindings.*`)
    InputBinding,
    /// Output bindings (`bindings.*`)
    OutputBinding,
    /// Name resolvers (`nameresolution.*`)
    NameResolution,
    /// HTTP middleware (`middleware.http.*`)
    HttpMiddleware,
    /// Configuration stores (`configuration.*`)
    Configuration,
}

impl Category {
    /// The external-facing name prefix for this category.
    ///
    /// Input and output bindings share the `bindings` prefix.
    pub fn prefix(&self) -> &'static str {
        match self {
            Category::SecretStore => "secretstores",
            Category::State => "state",
            Category::PubSub => "pubsub",
            Category::InputBinding | Category::OutputBinding => "bindings",
            Category::NameResolution => "nameresolution",
            Category::HttpMiddleware => "middleware.http",
            Category::Configuration => "configuration",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Category::SecretStore => "secret store",
            Category::State => "state store",
            Category::PubSub => "pub/sub",
            Category::InputBinding => "input binding",
            Category::OutputBinding => "output binding",
            Category::NameResolution => "name resolver",
            Category::HttpMiddleware => "HTTP middleware",
            Category::Configuration => "configuration store",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by registry lookups and factory invocations
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No factory is registered under the requested name and version
    #[error("couldn't find {category} {name}/{version}")]
    ProviderNotFound {
        /// Category searched
        category: Category,
        /// Requested full name
        name: String,
        /// Requested version
        version: String,
    },

    /// The factory itself failed (middleware factories are fallible)
    #[error("error creating {category} {name}/{version}: {message}")]
    ProviderConstruction {
        /// Category of the failing provider
        category: Category,
        /// Requested full name
        name: String,
        /// Requested version
        version: String,
        /// Factory error text
        message: String,
    },
}

/// Whether a version string selects the initial (bare-name) slot.
///
/// The input must already be lowercase.
fn is_initial_version(version: &str) -> bool {
    matches!(version, "" | "v0" | "v1")
}

/// Build the registration key for a bare provider name, which may carry an
/// inline `/version` suffix
fn registration_key(prefix: &str, name: &str) -> String {
    format!("{prefix}.{name}").to_lowercase()
}

/// A named factory producing fresh provider instances
pub struct ProviderEntry<T> {
    name: String,
    factory: Arc<dyn Fn() -> T + Send + Sync>,
}

impl<T> ProviderEntry<T> {
    /// Create an entry; `name` may include a `/vN` version suffix
    pub fn new(name: impl Into<String>, factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }
}

/// Registry of provider factories for one category
pub struct Registry<T> {
    category: Category,
    factories: HashMap<String, Arc<dyn Fn() -> T + Send + Sync>>,
}

impl<T> Registry<T> {
    /// Create an empty registry for the given category
    pub fn new(category: Category) -> Self {
        Self {
            category,
            factories: HashMap::new(),
        }
    }

    /// Category this registry serves
    pub fn category(&self) -> Category {
        self.category
    }

    /// Register one or more provider factories
    pub fn register(&mut self, entries: impl IntoIterator<Item = ProviderEntry<T>>) {
        for entry in entries {
            let key = registration_key(self.category.prefix(), &entry.name);
            self.factories.insert(key, entry.factory);
        }
    }

    /// Whether a factory exists for the full name and version
    pub fn has(&self, full_name: &str, version: &str) -> bool {
        self.lookup(full_name, version).is_some()
    }

    /// Produce a fresh provider instance for the full name and version
    pub fn create(&self, full_name: &str, version: &str) -> Result<T, RegistryError> {
        match self.lookup(full_name, version) {
            Some(factory) => Ok(factory()),
            None => Err(RegistryError::ProviderNotFound {
                category: self.category,
                name: full_name.to_string(),
                version: version.to_string(),
            }),
        }
    }

    fn lookup(&self, full_name: &str, version: &str) -> Option<&Arc<dyn Fn() -> T + Send + Sync>> {
        let name = full_name.to_lowercase();
        let version = version.to_lowercase();
        if let Some(factory) = self.factories.get(&format!("{name}/{version}")) {
            return Some(factory);
        }
        if is_initial_version(&version) {
            return self.factories.get(&name);
        }
        None
    }
}

/// A named, fallible middleware factory taking a metadata bag
pub struct MiddlewareEntry {
    name: String,
    factory: Arc<dyn Fn(Metadata) -> Result<Box<dyn HttpMiddleware>, ProviderError> + Send + Sync>,
}

impl MiddlewareEntry {
    /// Create an entry; `name` may include a `/vN` version suffix
    pub fn new(
        name: impl Into<String>,
        factory: impl Fn(Metadata) -> Result<Box<dyn HttpMiddleware>, ProviderError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }
}

/// Registry variant for HTTP middleware, whose factories take configuration
/// metadata and may fail
#[derive(Default)]
pub struct MiddlewareRegistry {
    factories: HashMap<
        String,
        Arc<dyn Fn(Metadata) -> Result<Box<dyn HttpMiddleware>, ProviderError> + Send + Sync>,
    >,
}

impl MiddlewareRegistry {
    /// Create an empty middleware registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one or more middleware factories
    pub fn register(&mut self, entries: impl IntoIterator<Item = MiddlewareEntry>) {
        for entry in entries {
            let key = registration_key(Category::HttpMiddleware.prefix(), &entry.name);
            self.factories.insert(key, entry.factory);
        }
    }

    /// Whether a factory exists for the full name and version
    pub fn has(&self, full_name: &str, version: &str) -> bool {
        self.lookup(full_name, version).is_some()
    }

    /// Construct a middleware for the full name and version with the given
    /// configuration metadata
    pub fn create(
        &self,
        full_name: &str,
        version: &str,
        metadata: Metadata,
    ) -> Result<Box<dyn HttpMiddleware>, RegistryError> {
        let factory = self.lookup(full_name, version).ok_or_else(|| {
            RegistryError::ProviderNotFound {
                category: Category::HttpMiddleware,
                name: full_name.to_string(),
                version: version.to_string(),
            }
        })?;
        factory(metadata).map_err(|e| RegistryError::ProviderConstruction {
            category: Category::HttpMiddleware,
            name: full_name.to_string(),
            version: version.to_string(),
            message: e.to_string(),
        })
    }

    fn lookup(
        &self,
        full_name: &str,
        version: &str,
    ) -> Option<&Arc<dyn Fn(Metadata) -> Result<Box<dyn HttpMiddleware>, ProviderError> + Send + Sync>>
    {
        let name = full_name.to_lowercase();
        let version = version.to_lowercase();
        if let Some(factory) = self.factories.get(&format!("{name}/{version}")) {
            return Some(factory);
        }
        if is_initial_version(&version) {
            return self.factories.get(&name);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::HttpHandler;

    /// Test provider carrying an identity tag so tests can tell which
    /// factory produced an instance
    #[derive(Debug)]
    struct TaggedProvider {
        tag: &'static str,
    }

    fn registry_with(entries: Vec<ProviderEntry<TaggedProvider>>) -> Registry<TaggedProvider> {
        let mut registry = Registry::new(Category::State);
        registry.register(entries);
        registry
    }

    #[test]
    fn lookup_is_case_insensitive_over_name_and_version() {
        let registry = registry_with(vec![ProviderEntry::new("redis", || TaggedProvider {
            tag: "redis-v1",
        })]);

        for name in ["state.redis", "STATE.REDIS", "State.Redis"] {
            for version in ["", "v0", "v1", "V0", "V1"] {
                let provider = registry.create(name, version).unwrap();
                assert_eq!(provider.tag, "redis-v1", "{name}/{version}");
            }
        }
    }

    #[test]
    fn versions_coexist_regardless_of_registration_order() {
        for flip in [false, true] {
            let mut entries = vec![
                ProviderEntry::new("redis", || TaggedProvider { tag: "initial" }),
                ProviderEntry::new("redis/v2", || TaggedProvider { tag: "v2" }),
            ];
            if flip {
                entries.reverse();
            }
            let registry = registry_with(entries);

            assert_eq!(registry.create("state.redis", "v0").unwrap().tag, "initial");
            assert_eq!(registry.create("state.redis", "v1").unwrap().tag, "initial");
            assert_eq!(registry.create("STATE.REDIS", "V2").unwrap().tag, "v2");
        }
    }

    #[test]
    fn bare_name_fallback_applies_only_to_initial_versions() {
        let registry = registry_with(vec![ProviderEntry::new("redis", || TaggedProvider {
            tag: "initial",
        })]);

        let err = registry.create("state.redis", "v2").unwrap_err();
        match err {
            RegistryError::ProviderNotFound {
                category,
                name,
                version,
            } => {
                assert_eq!(category, Category::State);
                assert_eq!(name, "state.redis");
                assert_eq!(version, "v2");
            }
            other => panic!("expected ProviderNotFound, got {other:?}"),
        }
        assert_eq!(registry.create("state.redis", "v3").unwrap_err().to_string(),
            "couldn't find state store state.redis/v3");
    }

    #[test]
    fn has_mirrors_create() {
        let registry = registry_with(vec![
            ProviderEntry::new("redis", || TaggedProvider { tag: "initial" }),
            ProviderEntry::new("redis/v2", || TaggedProvider { tag: "v2" }),
        ]);

        assert!(registry.has("state.redis", ""));
        assert!(registry.has("state.redis", "v2"));
        assert!(!registry.has("state.redis", "v3"));
        assert!(!registry.has("state.memcached", ""));
    }

    #[test]
    fn registered_name_may_carry_inline_version() {
        let registry = registry_with(vec![ProviderEntry::new("Redis/V2", || TaggedProvider {
            tag: "v2",
        })]);

        // The inline version was lowercased into the key
        assert!(registry.has("state.redis", "v2"));
        assert!(!registry.has("state.redis", ""));
    }

    struct NoopMiddleware;

    impl HttpMiddleware for NoopMiddleware {
        fn wrap(&self, next: HttpHandler) -> HttpHandler {
            next
        }
    }

    #[test]
    fn middleware_factory_errors_are_wrapped() {
        let mut registry = MiddlewareRegistry::new();
        registry.register(vec![
            MiddlewareEntry::new("uppercase", |_md| Ok(Box::new(NoopMiddleware) as Box<dyn HttpMiddleware>)),
            MiddlewareEntry::new("broken", |_md| Err("bad config".into())),
        ]);

        assert!(registry
            .create("middleware.http.uppercase", "v1", Metadata::default())
            .is_ok());

        let err = registry
            .create("middleware.http.broken", "", Metadata::default())
            .unwrap_err();
        match &err {
            RegistryError::ProviderConstruction { message, .. } => {
                assert_eq!(message, "bad config");
            }
            other => panic!("expected ProviderConstruction, got {other:?}"),
        }
        assert!(err.to_string().contains("middleware.http.broken"));

        let err = registry
            .create("middleware.http.missing", "", Metadata::default())
            .unwrap_err();
        assert!(matches!(err, RegistryError::ProviderNotFound { .. }));
    }

    // Scenario: a sidecar registers redis twice, once bare and once as /v2,
    // then resolves components against both slots.
    #[test]
    fn versioned_redis_scenario() {
        let registry = registry_with(vec![
            ProviderEntry::new("redis", || TaggedProvider { tag: "f_redis" }),
            ProviderEntry::new("redis/v2", || TaggedProvider { tag: "f_redis2" }),
        ]);

        assert_eq!(registry.create("state.redis", "v0").unwrap().tag, "f_redis");
        assert_eq!(registry.create("STATE.REDIS", "V2").unwrap().tag, "f_redis2");
        assert!(matches!(
            registry.create("state.redis", "v3"),
            Err(RegistryError::ProviderNotFound { .. })
        ));
    }
}
