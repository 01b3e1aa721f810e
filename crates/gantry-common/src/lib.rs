//! Common types for Gantry: errors, constants and shared utilities

#![deny(missing_docs)]

pub mod env;
pub mod error;
pub mod health;
pub mod netconf;
pub mod validation;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Annotation / Kubernetes API group prefix for all Gantry resources
pub const ANNOTATION_PREFIX: &str = "gantry.dev";

/// Name of the sidecar container injected into application pods
pub const SIDECAR_CONTAINER_NAME: &str = "gantry-sidecar";

/// HTTP port the sidecar data plane listens on
pub const SIDECAR_HTTP_PORT: i32 = 3500;

/// Public (health/metadata) port of the sidecar
pub const SIDECAR_PUBLIC_PORT: i32 = 3501;

/// API gRPC port of the sidecar
pub const SIDECAR_API_GRPC_PORT: i32 = 50001;

/// Internal (sidecar-to-sidecar) gRPC port
pub const SIDECAR_INTERNAL_GRPC_PORT: i32 = 50002;

/// Port of the placement service
pub const PLACEMENT_SERVICE_PORT: i32 = 50005;

/// Port of the sentry (certificate authority) service
pub const SENTRY_SERVICE_PORT: i32 = 80;

/// Server-side port of the operator API
pub const OPERATOR_API_PORT: i32 = 6500;

/// Service name of the operator API
pub const OPERATOR_API_SERVICE: &str = "gantry-api";

/// Service name of the placement server
pub const PLACEMENT_SERVICE: &str = "gantry-placement-server";

/// Service name of the sentry
pub const SENTRY_SERVICE: &str = "gantry-sentry";

/// Name of the Kubernetes secret holding the platform trust bundle
pub const TRUST_BUNDLE_SECRET_NAME: &str = "gantry-trust-bundle";

/// Trust-bundle secret key for the root certificate
pub const ROOT_CERT_FILENAME: &str = "ca.crt";

/// Trust-bundle secret key for the issuer certificate
pub const ISSUER_CERT_FILENAME: &str = "issuer.crt";

/// Trust-bundle secret key for the issuer private key
pub const ISSUER_KEY_FILENAME: &str = "issuer.key";

/// Environment variable carrying the trust anchors into the sidecar
pub const TRUST_ANCHORS_ENV_VAR: &str = "GANTRY_TRUST_ANCHORS";

/// Environment variable carrying the certificate chain into the sidecar
pub const CERT_CHAIN_ENV_VAR: &str = "GANTRY_CERT_CHAIN";

/// Environment variable carrying the certificate key into the sidecar
pub const CERT_KEY_ENV_VAR: &str = "GANTRY_CERT_KEY";

/// Environment variable carrying the sentry identity of the sidecar
pub const SENTRY_LOCAL_IDENTITY_ENV_VAR: &str = "SENTRY_LOCAL_IDENTITY";

/// Environment variable holding the Gantry API token
pub const API_TOKEN_ENV_VAR: &str = "GANTRY_API_TOKEN";

/// Environment variable holding the application API token
pub const APP_API_TOKEN_ENV_VAR: &str = "APP_API_TOKEN";

/// Build the in-cluster address of a control-plane service
pub fn service_address(name: &str, namespace: &str, cluster_domain: &str, port: i32) -> String {
    format!("{name}.{namespace}.svc.{cluster_domain}:{port}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_address_format() {
        assert_eq!(
            service_address(PLACEMENT_SERVICE, "gantry-system", "cluster.local", PLACEMENT_SERVICE_PORT),
            "gantry-placement-server.gantry-system.svc.cluster.local:50005"
        );
    }
}
