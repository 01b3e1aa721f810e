//! Injector configuration
//!
//! All options come from the environment (the webhook runs as a Deployment
//! with env-driven config); flags exist for local runs.

use clap::Parser;
use gantry_common::netconf;
use tracing::warn;

/// Port the webhook server listens on
pub const WEBHOOK_PORT: u16 = 4000;

/// Configuration for the sidecar injector webhook server
#[derive(Clone, Debug, Parser)]
#[command(name = "gantry-injector", about = "Gantry sidecar injector webhook")]
pub struct InjectorConfig {
    /// Path to the TLS certificate presented to the API server
    #[arg(long, env = "TLS_CERT_FILE")]
    pub tls_cert_file: String,

    /// Path to the TLS private key
    #[arg(long, env = "TLS_KEY_FILE")]
    pub tls_key_file: String,

    /// Sidecar image injected into pods
    #[arg(long, env = "SIDECAR_IMAGE")]
    pub sidecar_image: String,

    /// Pull policy for the sidecar image
    #[arg(long, env = "SIDECAR_IMAGE_PULL_POLICY", default_value = "Always")]
    pub sidecar_image_pull_policy: String,

    /// Namespace the control plane runs in
    #[arg(long, env = "NAMESPACE")]
    pub namespace: String,

    /// Kubernetes cluster domain; auto-detected from resolv.conf when empty
    #[arg(long, env = "KUBE_CLUSTER_DOMAIN", default_value = "")]
    pub kube_cluster_domain: String,
}

impl InjectorConfig {
    /// Fill in the cluster domain if it was not configured explicitly
    pub fn detect_cluster_domain(&mut self) {
        if !self.kube_cluster_domain.is_empty() {
            return;
        }
        self.kube_cluster_domain = match netconf::kube_cluster_domain() {
            Ok(domain) => domain,
            Err(e) => {
                warn!(
                    error = %e,
                    default = netconf::DEFAULT_KUBE_CLUSTER_DOMAIN,
                    "failed to detect cluster domain, using default"
                );
                netconf::DEFAULT_KUBE_CLUSTER_DOMAIN.to_string()
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_cluster_domain_is_kept() {
        let mut config = InjectorConfig::parse_from([
            "gantry-injector",
            "--tls-cert-file", "/certs/tls.crt",
            "--tls-key-file", "/certs/tls.key",
            "--sidecar-image", "gantry/sidecar:1.0",
            "--namespace", "gantry-system",
            "--kube-cluster-domain", "corp.local",
        ]);
        config.detect_cluster_domain();
        assert_eq!(config.kube_cluster_domain, "corp.local");
        assert_eq!(config.sidecar_image_pull_policy, "Always");
    }
}
