//! JSON-patch synthesis for the admitted pod
//!
//! A pod with no containers gets the sidecar as the whole container list;
//! otherwise the sidecar is appended and every pre-existing container gains
//! the `APP_HTTP_PORT`/`APP_GRPC_PORT` env vars. Existing same-named env
//! vars are never overwritten.

use gantry_common::{SIDECAR_API_GRPC_PORT, SIDECAR_HTTP_PORT};
use json_patch::{AddOperation, PatchOperation};
use k8s_openapi::api::core::v1::{Container, EnvVar, Pod};

/// Env var name carrying the sidecar HTTP port into app containers
pub const APP_HTTP_PORT_ENV: &str = "APP_HTTP_PORT";

/// Env var name carrying the sidecar gRPC port into app containers
pub const APP_GRPC_PORT_ENV: &str = "APP_GRPC_PORT";

const CONTAINERS_PATH: &str = "/spec/containers";

/// Build the full patch for injecting `sidecar` into `pod`
pub fn build_patch_operations(pod: &Pod, sidecar: Container) -> Vec<PatchOperation> {
    let containers = pod
        .spec
        .as_ref()
        .map(|spec| spec.containers.as_slice())
        .unwrap_or_default();

    let mut ops = Vec::new();
    if containers.is_empty() {
        ops.push(PatchOperation::Add(AddOperation {
            path: CONTAINERS_PATH.to_string(),
            value: serde_json::to_value(vec![sidecar]).unwrap_or_default(),
        }));
    } else {
        ops.push(PatchOperation::Add(AddOperation {
            path: format!("{CONTAINERS_PATH}/-"),
            value: serde_json::to_value(sidecar).unwrap_or_default(),
        }));
        ops.extend(env_patch_operations(containers));
    }
    ops
}

/// Ops injecting the sidecar port env vars into every pre-existing container
fn env_patch_operations(containers: &[Container]) -> Vec<PatchOperation> {
    let port_env = vec![
        EnvVar {
            name: APP_HTTP_PORT_ENV.to_string(),
            value: Some(SIDECAR_HTTP_PORT.to_string()),
            ..Default::default()
        },
        EnvVar {
            name: APP_GRPC_PORT_ENV.to_string(),
            value: Some(SIDECAR_API_GRPC_PORT.to_string()),
            ..Default::default()
        },
    ];

    let mut ops = Vec::new();
    for (i, container) in containers.iter().enumerate() {
        ops.extend(container_env_ops(container, &port_env, i));
    }
    ops
}

/// Ops for one container: create the env list when absent, else append each
/// missing variable individually
fn container_env_ops(
    container: &Container,
    add_env: &[EnvVar],
    index: usize,
) -> Vec<PatchOperation> {
    let env_path = format!("{CONTAINERS_PATH}/{index}/env");
    let existing = container.env.as_deref().unwrap_or_default();
    if existing.is_empty() {
        return vec![PatchOperation::Add(AddOperation {
            path: env_path,
            value: serde_json::to_value(add_env).unwrap_or_default(),
        })];
    }

    add_env
        .iter()
        .filter(|env| existing.iter().all(|actual| actual.name != env.name))
        .map(|env| {
            PatchOperation::Add(AddOperation {
                path: format!("{env_path}/-"),
                value: serde_json::to_value(env).unwrap_or_default(),
            })
        })
        .collect()
}
