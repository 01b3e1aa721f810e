//! Subscription CRD: pub/sub topic subscriptions
//!
//! The storage version is v2alpha1, which routes matched messages to paths
//! via CEL rules with an optional default. The legacy v1alpha1 form carries a
//! single route; the two convert losslessly for the default path. Rules have
//! no v1alpha1 representation: down-converting a subscription that carries
//! rules keeps only the default route and logs a warning.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Spec for a v2alpha1 Subscription resource
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "gantry.dev",
    version = "v2alpha1",
    kind = "Subscription",
    plural = "subscriptions",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSpec {
    /// The pub/sub component name
    pub pubsubname: String,

    /// The topic to subscribe to
    pub topic: String,

    /// Optional metadata passed to the pub/sub component
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,

    /// Routing configuration for this topic
    #[serde(default)]
    pub routes: Routes,

    /// App IDs this subscription applies to; empty means all
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

/// Rules and optional default path for a topic
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Routes {
    /// Match rules, tested in order, most specific first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,

    /// Path for messages no rule matches
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default: String,
}

/// A single routing rule
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// CEL expression matched against the event; empty marks the default
    pub r#match: String,

    /// Path for events matching this rule
    pub path: String,
}

/// Legacy single-route subscription form
pub mod v1alpha1 {
    use super::*;
    use kube::api::ObjectMeta;

    /// A v1alpha1 subscription: same shape as v2alpha1 but with a single
    /// `route` instead of the `routes` block
    #[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct Subscription {
        /// Standard object metadata
        #[serde(default)]
        pub metadata: ObjectMeta,

        /// Subscription spec
        #[serde(default)]
        pub spec: SubscriptionSpec,
    }

    /// Spec for a v1alpha1 subscription
    #[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct SubscriptionSpec {
        /// The pub/sub component name
        pub pubsubname: String,

        /// The topic to subscribe to
        pub topic: String,

        /// Optional metadata passed to the pub/sub component
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        pub metadata: BTreeMap<String, String>,

        /// Path messages on this topic are delivered to
        #[serde(default, skip_serializing_if = "String::is_empty")]
        pub route: String,

        /// App IDs this subscription applies to; empty means all
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub scopes: Vec<String>,
    }
}

impl Subscription {
    /// Convert to the legacy v1alpha1 form.
    ///
    /// Only the default route survives; rules are dropped with a warning.
    pub fn to_v1alpha1(&self) -> v1alpha1::Subscription {
        if !self.spec.routes.rules.is_empty() {
            warn!(
                subscription = self.metadata.name.as_deref().unwrap_or_default(),
                rules = self.spec.routes.rules.len(),
                "routing rules have no v1alpha1 representation and were dropped"
            );
        }
        v1alpha1::Subscription {
            metadata: self.metadata.clone(),
            spec: v1alpha1::SubscriptionSpec {
                pubsubname: self.spec.pubsubname.clone(),
                topic: self.spec.topic.clone(),
                metadata: self.spec.metadata.clone(),
                route: self.spec.routes.default.clone(),
                scopes: self.spec.scopes.clone(),
            },
        }
    }

    /// Build the storage form from a legacy v1alpha1 subscription.
    ///
    /// The single route becomes the default path of the routed form.
    pub fn from_v1alpha1(src: &v1alpha1::Subscription) -> Self {
        Self {
            metadata: src.metadata.clone(),
            spec: SubscriptionSpec {
                pubsubname: src.spec.pubsubname.clone(),
                topic: src.spec.topic.clone(),
                metadata: src.spec.metadata.clone(),
                routes: Routes {
                    rules: Vec::new(),
                    default: src.spec.route.clone(),
                },
                scopes: src.spec.scopes.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Subscription {
        Subscription::new(
            "orders-sub",
            SubscriptionSpec {
                pubsubname: "p".to_string(),
                topic: "t".to_string(),
                metadata: BTreeMap::from([("a".to_string(), "b".to_string())]),
                routes: Routes {
                    rules: Vec::new(),
                    default: "/x".to_string(),
                },
                scopes: vec!["s1".to_string()],
            },
        )
    }

    #[test]
    fn round_trips_through_v1alpha1() {
        let original = sample();

        let v1 = original.to_v1alpha1();
        assert_eq!(v1.spec.route, "/x");
        assert_eq!(v1.spec.pubsubname, "p");
        assert_eq!(v1.spec.topic, "t");
        assert_eq!(v1.spec.metadata.get("a").map(String::as_str), Some("b"));
        assert_eq!(v1.spec.scopes, vec!["s1".to_string()]);

        let back = Subscription::from_v1alpha1(&v1);
        assert_eq!(back, original);
    }

    #[test]
    fn down_conversion_drops_rules_keeping_default() {
        let mut sub = sample();
        sub.spec.routes.rules.push(Rule {
            r#match: r#"event.type == "order""#.to_string(),
            path: "/orders".to_string(),
        });

        let v1 = sub.to_v1alpha1();
        assert_eq!(v1.spec.route, "/x");

        // Re-converting yields the ruleless form, not the original
        let back = Subscription::from_v1alpha1(&v1);
        assert!(back.spec.routes.rules.is_empty());
        assert_eq!(back.spec.routes.default, "/x");
    }

    #[test]
    fn v1alpha1_deserializes_single_route_form() {
        let yaml = r#"
metadata:
  name: legacy
spec:
  pubsubname: bus
  topic: orders
  route: /orders
"#;
        let sub: v1alpha1::Subscription = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(sub.spec.route, "/orders");

        let v2 = Subscription::from_v1alpha1(&sub);
        assert_eq!(v2.spec.routes.default, "/orders");
        assert!(v2.spec.routes.rules.is_empty());
    }
}
