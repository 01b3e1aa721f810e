//! Component CRD: a named, versioned configuration for one backend provider
//!
//! A component binds a provider type (e.g. `state.redis`) to the metadata its
//! factory needs. Metadata values are opaque JSON documents; entries may
//! instead reference a Kubernetes secret, which the operator resolves inline
//! before shipping the component to a sidecar.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Spec for a Component resource
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "gantry.dev",
    version = "v1alpha1",
    kind = "Component",
    plural = "components",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    /// Category-prefixed provider name, e.g. `state.redis`
    #[serde(rename = "type")]
    pub component_type: String,

    /// Provider version string; empty, `v0` and `v1` select the initial version
    #[serde(default)]
    pub version: String,

    /// Continue sidecar startup even if this component fails to initialize
    #[serde(default)]
    pub ignore_errors: bool,

    /// Provider configuration as ordered name/value pairs
    #[serde(default)]
    pub metadata: Vec<MetadataItem>,

    /// Initialization timeout, interpreted by the backend
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub init_timeout: String,

    /// Authentication settings (which secret store resolves references)
    #[serde(default)]
    pub auth: ComponentAuth,

    /// App IDs permitted to consume this component; empty means unrestricted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

/// One name/value pair of component configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetadataItem {
    /// Metadata key
    pub name: String,

    /// Inline value as an opaque JSON document
    #[serde(default, skip_serializing_if = "DynamicValue::is_null")]
    pub value: DynamicValue,

    /// Reference to a secret holding the value instead of an inline value
    #[serde(default, skip_serializing_if = "SecretKeyRef::is_empty")]
    pub secret_key_ref: SecretKeyRef,
}

/// Reference to a key inside a Kubernetes secret
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyRef {
    /// Secret name
    #[serde(default)]
    pub name: String,

    /// Key within the secret; defaults to the secret name when empty
    #[serde(default)]
    pub key: String,
}

impl SecretKeyRef {
    /// Whether this reference is unset
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.key.is_empty()
    }
}

/// Authentication settings for a component
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentAuth {
    /// Secret store used to resolve this component's secret references.
    /// Empty selects the built-in cluster store.
    #[serde(default)]
    pub secret_store: String,
}

/// Opaque JSON value for a metadata entry.
///
/// Often a quoted string, but any JSON document is allowed. The raw document
/// is preserved as-is so providers can apply their own typing.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct DynamicValue(pub serde_json::Value);

impl DynamicValue {
    /// Build a dynamic value holding a JSON string literal
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(serde_json::Value::String(s.into()))
    }

    /// Whether the value is unset
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// The plain string form of the value.
    ///
    /// String literals are unquoted; any other document is returned as its
    /// compact JSON text.
    pub fn as_plain_string(&self) -> String {
        match &self.0 {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl Component {
    /// Name of this component, empty if unset
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Namespace of this component, empty if unset
    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    /// Whether the given app ID may consume this component.
    ///
    /// An empty scope list means every app may.
    pub fn in_scope(&self, app_id: &str) -> bool {
        self.spec.scopes.is_empty() || self.spec.scopes.iter().any(|s| s == app_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_from_yaml_manifest() {
        let yaml = r#"
apiVersion: gantry.dev/v1alpha1
kind: Component
metadata:
  name: statestore
  namespace: default
spec:
  type: state.redis
  version: v1
  metadata:
    - name: redisHost
      value: "localhost:6379"
    - name: redisPassword
      secretKeyRef:
        name: redis-secret
        key: password
"#;
        let component: Component = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(component.name(), "statestore");
        assert_eq!(component.spec.component_type, "state.redis");
        assert_eq!(component.spec.version, "v1");
        assert_eq!(component.spec.metadata.len(), 2);
        assert_eq!(component.spec.metadata[0].value.as_plain_string(), "localhost:6379");
        assert_eq!(component.spec.metadata[1].secret_key_ref.name, "redis-secret");
        assert_eq!(component.spec.metadata[1].secret_key_ref.key, "password");
    }

    #[test]
    fn dynamic_value_unquotes_string_literals() {
        let v: DynamicValue = serde_json::from_str(r#""hello""#).unwrap();
        assert_eq!(v.as_plain_string(), "hello");

        let v: DynamicValue = serde_json::from_str("6379").unwrap();
        assert_eq!(v.as_plain_string(), "6379");

        let v: DynamicValue = serde_json::from_str(r#"{"a":1}"#).unwrap();
        assert_eq!(v.as_plain_string(), r#"{"a":1}"#);
    }

    #[test]
    fn scopes_gate_consumption() {
        let mut component = Component::new("c", ComponentSpec::default());
        assert!(component.in_scope("any-app"));

        component.spec.scopes = vec!["app-1".to_string()];
        assert!(component.in_scope("app-1"));
        assert!(!component.in_scope("app-2"));
    }

    #[test]
    fn json_round_trip_preserves_metadata() {
        let mut spec = ComponentSpec {
            component_type: "pubsub.kafka".to_string(),
            version: "v2".to_string(),
            ..Default::default()
        };
        spec.metadata.push(MetadataItem {
            name: "brokers".to_string(),
            value: DynamicValue::from_string("kafka:9092"),
            ..Default::default()
        });
        let component = Component::new("bus", spec);

        let json = serde_json::to_string(&component).unwrap();
        let back: Component = serde_json::from_str(&json).unwrap();
        assert_eq!(back.spec, component.spec);
    }
}
