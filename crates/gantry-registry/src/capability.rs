//! Capability contracts for backend providers
//!
//! One trait per provider category. Factories registered with the
//! [`crate::Registry`] produce boxed instances of these traits; the concrete
//! adapters (Redis, Kafka, ...) live outside this repository.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// Error type produced by provider operations.
///
/// Backends surface their own error types; at the capability seam they are
/// boxed.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Configuration handed to a provider at initialization, taken from the
/// component definition's metadata pairs
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Metadata {
    /// Flattened name/value configuration properties
    pub properties: HashMap<String, String>,
}

impl Metadata {
    /// Build a metadata bag from an iterator of name/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            properties: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Handle for an active subscription; dropping it or calling `cancel`
/// stops delivery
pub struct SubscriptionHandle {
    canceller: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    /// Wrap a cancellation closure
    pub fn new(canceller: impl FnOnce() + Send + 'static) -> Self {
        Self {
            canceller: Some(Box::new(canceller)),
        }
    }

    /// Stop the subscription
    pub fn cancel(mut self) {
        if let Some(cancel) = self.canceller.take() {
            cancel();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.canceller.take() {
            cancel();
        }
    }
}

// ---------------------------------------------------------------------------
// Secret stores
// ---------------------------------------------------------------------------

/// A store of named secrets
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Initialize the store with component metadata
    async fn init(&mut self, metadata: Metadata) -> ProviderResult<()>;

    /// Fetch a secret by name; the returned map holds one entry per key
    async fn get_secret(
        &self,
        name: &str,
        metadata: &HashMap<String, String>,
    ) -> ProviderResult<HashMap<String, String>>;
}

// ---------------------------------------------------------------------------
// State stores
// ---------------------------------------------------------------------------

/// Optional capabilities a state store may advertise
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateFeature {
    /// First-write-wins concurrency via ETags
    Etag,
    /// Multi-operation transactions
    Transactional,
    /// Server-side query support
    Query,
}

/// A keyed state item
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateItem {
    /// Item key
    pub key: String,
    /// Item value bytes
    pub value: Vec<u8>,
    /// Concurrency tag, if the store supports ETags
    pub etag: Option<String>,
}

/// One operation inside a state transaction
#[derive(Clone, Debug, PartialEq)]
pub enum TransactionalOperation {
    /// Upsert the item
    Upsert(StateItem),
    /// Delete the keyed item
    Delete {
        /// Key to delete
        key: String,
        /// Concurrency tag, if any
        etag: Option<String>,
    },
}

/// A durable key/value store
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Initialize the store with component metadata
    async fn init(&mut self, metadata: Metadata) -> ProviderResult<()>;

    /// Fetch one item; `None` when the key does not exist
    async fn get(&self, key: &str) -> ProviderResult<Option<StateItem>>;

    /// Upsert one item
    async fn set(&self, item: StateItem) -> ProviderResult<()>;

    /// Delete one item
    async fn delete(&self, key: &str, etag: Option<String>) -> ProviderResult<()>;

    /// Fetch many items at once
    async fn bulk_get(&self, keys: &[String]) -> ProviderResult<Vec<Option<StateItem>>>;

    /// Upsert many items at once
    async fn bulk_set(&self, items: Vec<StateItem>) -> ProviderResult<()>;

    /// Delete many items at once
    async fn bulk_delete(&self, keys: &[String]) -> ProviderResult<()>;

    /// Apply a transaction; requires [`StateFeature::Transactional`]
    async fn multi(&self, operations: Vec<TransactionalOperation>) -> ProviderResult<()>;

    /// Capabilities this store supports
    fn features(&self) -> Vec<StateFeature>;
}

// ---------------------------------------------------------------------------
// Pub/sub
// ---------------------------------------------------------------------------

/// A message delivered to a pub/sub handler
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PubSubMessage {
    /// Topic the message arrived on
    pub topic: String,
    /// Message payload
    pub data: Vec<u8>,
    /// Delivery metadata
    pub metadata: HashMap<String, String>,
}

/// Async handler invoked once per delivered message
pub type MessageHandler =
    std::sync::Arc<dyn Fn(PubSubMessage) -> BoxFuture<'static, ProviderResult<()>> + Send + Sync>;

/// Optional capabilities a pub/sub bus may advertise
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PubSubFeature {
    /// Per-message time-to-live
    MessageTtl,
    /// Subscriber-side routing rules
    SubscribeWildcards,
}

/// A publish/subscribe message bus
#[async_trait]
pub trait PubSub: Send + Sync {
    /// Initialize the bus with component metadata
    async fn init(&mut self, metadata: Metadata) -> ProviderResult<()>;

    /// Publish a payload to a topic
    async fn publish(
        &self,
        topic: &str,
        data: Vec<u8>,
        metadata: &HashMap<String, String>,
    ) -> ProviderResult<()>;

    /// Subscribe to a topic; messages are delivered to `handler` until the
    /// returned handle is cancelled
    async fn subscribe(
        &self,
        topic: &str,
        handler: MessageHandler,
        metadata: &HashMap<String, String>,
    ) -> ProviderResult<SubscriptionHandle>;

    /// Capabilities this bus supports
    fn features(&self) -> Vec<PubSubFeature>;
}

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

/// Result of an output-binding invocation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BindingResponse {
    /// Response payload
    pub data: Vec<u8>,
    /// Response metadata
    pub metadata: HashMap<String, String>,
}

/// Async handler invoked once per event read from an input binding
pub type BindingHandler =
    std::sync::Arc<dyn Fn(Vec<u8>, HashMap<String, String>) -> BoxFuture<'static, ProviderResult<()>> + Send + Sync>;

/// An event source feeding the application
#[async_trait]
pub trait InputBinding: Send + Sync {
    /// Initialize the binding with component metadata
    async fn init(&mut self, metadata: Metadata) -> ProviderResult<()>;

    /// Read events, delivering each to `handler`, until the binding closes
    async fn read(&self, handler: BindingHandler) -> ProviderResult<()>;
}

/// An invocable external system
#[async_trait]
pub trait OutputBinding: Send + Sync {
    /// Initialize the binding with component metadata
    async fn init(&mut self, metadata: Metadata) -> ProviderResult<()>;

    /// Invoke a named operation on the external system
    async fn invoke(
        &self,
        operation: &str,
        data: Vec<u8>,
        metadata: &HashMap<String, String>,
    ) -> ProviderResult<BindingResponse>;

    /// Operations this binding supports
    fn operations(&self) -> Vec<String>;
}

// ---------------------------------------------------------------------------
// Name resolution
// ---------------------------------------------------------------------------

/// A request to resolve an app ID to a network address
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolveRequest {
    /// App ID to resolve
    pub id: String,
    /// Namespace the app runs in
    pub namespace: String,
    /// Port the caller wants to reach
    pub port: i32,
}

/// Resolves app IDs to addresses
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Initialize the resolver with component metadata
    async fn init(&mut self, metadata: Metadata) -> ProviderResult<()>;

    /// Resolve an app ID to a `host:port` address
    async fn resolve_id(&self, request: ResolveRequest) -> ProviderResult<String>;
}

// ---------------------------------------------------------------------------
// HTTP middleware
// ---------------------------------------------------------------------------

/// Minimal HTTP request shape flowing through middleware
#[derive(Clone, Debug, Default)]
pub struct HttpRequest {
    /// Request method
    pub method: String,
    /// Request path
    pub path: String,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Request body
    pub body: Vec<u8>,
}

/// Minimal HTTP response shape flowing through middleware
#[derive(Clone, Debug, Default)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Response headers
    pub headers: HashMap<String, String>,
    /// Response body
    pub body: Vec<u8>,
}

/// Boxed async request handler; middleware wraps one of these into another
pub type HttpHandler =
    std::sync::Arc<dyn Fn(HttpRequest) -> BoxFuture<'static, HttpResponse> + Send + Sync>;

/// An HTTP middleware constructed from a metadata bag
pub trait HttpMiddleware: Send + Sync {
    /// Wrap the next handler, returning the composed handler
    fn wrap(&self, next: HttpHandler) -> HttpHandler;
}

impl std::fmt::Debug for dyn HttpMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HttpMiddleware")
    }
}

// ---------------------------------------------------------------------------
// Configuration stores
// ---------------------------------------------------------------------------

/// Handler invoked when subscribed configuration keys change
pub type ConfigurationHandler =
    std::sync::Arc<dyn Fn(HashMap<String, String>) -> BoxFuture<'static, ()> + Send + Sync>;

/// An external configuration source
#[async_trait]
pub trait ConfigurationStore: Send + Sync {
    /// Initialize the store with component metadata
    async fn init(&mut self, metadata: Metadata) -> ProviderResult<()>;

    /// Fetch the current values of the given keys
    async fn get(
        &self,
        keys: &[String],
        metadata: &HashMap<String, String>,
    ) -> ProviderResult<HashMap<String, String>>;

    /// Watch the given keys for changes
    async fn subscribe(
        &self,
        keys: &[String],
        handler: ConfigurationHandler,
    ) -> ProviderResult<SubscriptionHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn metadata_from_pairs() {
        let md = Metadata::from_pairs([("host", "localhost"), ("port", "6379")]);
        assert_eq!(md.properties.get("host").map(String::as_str), Some("localhost"));
        assert_eq!(md.properties.len(), 2);
    }

    #[test]
    fn subscription_handle_cancels_once() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let handle = SubscriptionHandle::new(move || flag.store(true, Ordering::SeqCst));
        handle.cancel();
        assert!(cancelled.load(Ordering::SeqCst));
    }

    #[test]
    fn subscription_handle_cancels_on_drop() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        {
            let _handle = SubscriptionHandle::new(move || flag.store(true, Ordering::SeqCst));
        }
        assert!(cancelled.load(Ordering::SeqCst));
    }
}
