//! Kubernetes cluster-domain detection
//!
//! Derives the cluster DNS domain from the `search` directive of
//! /etc/resolv.conf, falling back to `cluster.local`.

use crate::{Error, Result};

/// Default cluster domain when detection finds nothing
pub const DEFAULT_KUBE_CLUSTER_DOMAIN: &str = "cluster.local";

const RESOLV_CONF_PATH: &str = "/etc/resolv.conf";

/// Read the cluster domain from /etc/resolv.conf
pub fn kube_cluster_domain() -> Result<String> {
    let content = std::fs::read_to_string(RESOLV_CONF_PATH)
        .map_err(|e| Error::io(RESOLV_CONF_PATH.to_string(), e))?;
    Ok(cluster_domain_from(&content))
}

/// Derive the cluster domain from resolv.conf contents.
///
/// The lexicographically-smallest search domain wins, matching the
/// `svc.<domain>` entries kubelet writes before shorter suffixes.
pub fn cluster_domain_from(resolv_conf: &str) -> String {
    let mut domains = search_domains(resolv_conf);
    domains.sort();
    match domains.first() {
        Some(d) if !d.is_empty() => d.clone(),
        _ => DEFAULT_KUBE_CLUSTER_DOMAIN.to_string(),
    }
}

/// Extract the domains of the last `search` directive, comments stripped
fn search_domains(resolv_conf: &str) -> Vec<String> {
    let mut domains = Vec::new();
    for line in resolv_conf.lines() {
        let line = line.split('#').next().unwrap_or_default().trim();
        if let Some(rest) = line.strip_prefix("search") {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                domains = rest.split_whitespace().map(str::to_string).collect();
            }
        }
    }
    domains
}
