//! Inline secret resolution
//!
//! Before a component ships to a sidecar, metadata entries referencing a
//! Kubernetes secret are replaced with the secret's value. The replacement
//! is a JSON string literal containing the base64 representation of the raw
//! bytes; downstream loaders recover the value by JSON-unquoting, so the
//! encoding is load-bearing.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use gantry_common::Result;
use gantry_resources::{Component, DynamicValue, KUBERNETES_SECRET_STORE};

use crate::store::ResourceStore;

/// Resolve every secret reference in `component` against the cluster store.
///
/// Only entries with a non-empty secret name are touched, and only when the
/// component's secret store is unset or explicitly the cluster store. A
/// fetch error aborts the enclosing operation; a missing key inside a
/// fetched secret leaves the entry unchanged.
pub async fn process_component_secrets(
    component: &mut Component,
    namespace: &str,
    store: &dyn ResourceStore,
) -> Result<()> {
    let secret_store = &component.spec.auth.secret_store;
    if !(secret_store.is_empty() || secret_store == KUBERNETES_SECRET_STORE) {
        return Ok(());
    }

    for item in &mut component.spec.metadata {
        if item.secret_key_ref.name.is_empty() {
            continue;
        }

        let data = store.get_secret(namespace, &item.secret_key_ref.name).await?;

        let key = if item.secret_key_ref.key.is_empty() {
            &item.secret_key_ref.name
        } else {
            &item.secret_key_ref.key
        };

        if let Some(bytes) = data.get(key) {
            item.value = DynamicValue(serde_json::Value::String(BASE64.encode(bytes)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use gantry_resources::{ComponentSpec, MetadataItem, SecretKeyRef};
    use std::collections::BTreeMap;

    fn component_with_ref(secret: &str, key: &str) -> Component {
        Component::new(
            "statestore",
            ComponentSpec {
                component_type: "state.redis".to_string(),
                metadata: vec![MetadataItem {
                    name: "redisPassword".to_string(),
                    secret_key_ref: SecretKeyRef {
                        name: secret.to_string(),
                        key: key.to_string(),
                    },
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
    }

    fn store_with_secret(namespace: &str, name: &str, key: &str, value: &[u8]) -> InMemoryStore {
        let store = InMemoryStore::new();
        store.put_secret(
            namespace,
            name,
            BTreeMap::from([(key.to_string(), value.to_vec())]),
        );
        store
    }

    #[tokio::test]
    async fn replaces_value_with_json_string_of_base64() {
        let store = store_with_secret("prod", "s1", "k1", b"value1");
        let mut component = component_with_ref("s1", "k1");

        process_component_secrets(&mut component, "prod", &store)
            .await
            .unwrap();

        let raw = serde_json::to_string(&component.spec.metadata[0].value).unwrap();
        assert_eq!(raw, "\"dmFsdWUx\"");
        // The loader side recovers the base64 text by JSON-unquoting
        assert_eq!(component.spec.metadata[0].value.as_plain_string(), "dmFsdWUx");
    }

    #[tokio::test]
    async fn key_defaults_to_the_secret_name() {
        let store = store_with_secret("prod", "s1", "s1", b"whole-secret");
        let mut component = component_with_ref("s1", "");

        process_component_secrets(&mut component, "prod", &store)
            .await
            .unwrap();

        assert_eq!(
            component.spec.metadata[0].value.as_plain_string(),
            BASE64.encode(b"whole-secret")
        );
    }

    #[tokio::test]
    async fn fetch_error_aborts() {
        let store = InMemoryStore::new();
        let mut component = component_with_ref("missing", "k1");

        let err = process_component_secrets(&mut component, "prod", &store)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[tokio::test]
    async fn missing_key_leaves_value_untouched() {
        let store = store_with_secret("prod", "s1", "other", b"x");
        let mut component = component_with_ref("s1", "k1");
        component.spec.metadata[0].value = DynamicValue::from_string("original");

        process_component_secrets(&mut component, "prod", &store)
            .await
            .unwrap();
        assert_eq!(component.spec.metadata[0].value.as_plain_string(), "original");
    }

    #[tokio::test]
    async fn foreign_secret_store_is_left_alone() {
        let store = store_with_secret("prod", "s1", "k1", b"value1");
        let mut component = component_with_ref("s1", "k1");
        component.spec.auth.secret_store = "vault".to_string();

        process_component_secrets(&mut component, "prod", &store)
            .await
            .unwrap();
        assert!(component.spec.metadata[0].value.is_null());
    }

    #[tokio::test]
    async fn explicit_kubernetes_store_is_resolved() {
        let store = store_with_secret("prod", "s1", "k1", b"value1");
        let mut component = component_with_ref("s1", "k1");
        component.spec.auth.secret_store = KUBERNETES_SECRET_STORE.to_string();

        process_component_secrets(&mut component, "prod", &store)
            .await
            .unwrap();
        assert!(!component.spec.metadata[0].value.is_null());
    }

    #[tokio::test]
    async fn inline_values_are_untouched() {
        let store = InMemoryStore::new();
        let mut component = Component::new(
            "c",
            ComponentSpec {
                component_type: "state.redis".to_string(),
                metadata: vec![MetadataItem {
                    name: "host".to_string(),
                    value: DynamicValue::from_string("localhost"),
                    ..Default::default()
                }],
                ..Default::default()
            },
        );

        process_component_secrets(&mut component, "prod", &store)
            .await
            .unwrap();
        assert_eq!(component.spec.metadata[0].value.as_plain_string(), "localhost");
    }
}
