//! Sidecar container synthesis
//!
//! Builds the complete container spec the webhook injects: ports, a
//! deterministic argument vector, environment (downward API, trust bundle,
//! identity, user env, token secrets), health probes, resources and security
//! context. Everything here is a pure function over already-fetched inputs
//! so it is testable without a cluster.

use std::collections::BTreeMap;

use gantry_common::{
    env::parse_env_string, Error, Result, API_TOKEN_ENV_VAR, APP_API_TOKEN_ENV_VAR,
    CERT_CHAIN_ENV_VAR, CERT_KEY_ENV_VAR, SENTRY_LOCAL_IDENTITY_ENV_VAR, SIDECAR_API_GRPC_PORT,
    SIDECAR_CONTAINER_NAME, SIDECAR_HTTP_PORT, SIDECAR_INTERNAL_GRPC_PORT, SIDECAR_PUBLIC_PORT,
    TRUST_ANCHORS_ENV_VAR,
};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, EnvVarSource, HTTPGetAction, ObjectFieldSelector, Pod,
    Probe, ResourceRequirements, SecretKeySelector, SecurityContext, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use tracing::warn;

use crate::annotations::{defaults, keys, Annotations};

const SIDECAR_BINARY: &str = "/gantryd";
const DEBUGGER_BINARY: &str = "/dlv";
const HEALTHZ_PATH: &str = "/v1.0/healthz";

const HTTP_PORT_NAME: &str = "app-http";
const GRPC_PORT_NAME: &str = "app-grpc";
const INTERNAL_PORT_NAME: &str = "app-internal";
const METRICS_PORT_NAME: &str = "app-metrics";
const DEBUG_PORT_NAME: &str = "app-debug";

/// Path where the service-account token volume is mounted
pub const KUBERNETES_MOUNT_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Already-resolved inputs for sidecar synthesis
pub struct SidecarInputs<'a> {
    /// Validated app ID
    pub app_id: &'a str,
    /// Default sidecar image (overridable by annotation)
    pub image: &'a str,
    /// Image pull policy
    pub image_pull_policy: &'a str,
    /// Namespace of the admitted pod
    pub namespace: &'a str,
    /// Address of the operator API
    pub control_plane_address: String,
    /// Address of the placement service
    pub placement_address: String,
    /// Address of the sentry
    pub sentry_address: String,
    /// Service-account token mount replicated from the app container, if any
    pub token_volume_mount: Option<VolumeMount>,
    /// PEM trust anchors from the trust bundle
    pub trust_anchors: String,
    /// PEM certificate chain from the trust bundle
    pub cert_chain: String,
    /// PEM certificate key from the trust bundle
    pub cert_key: String,
    /// Whether workload mTLS is enabled cluster-wide
    pub mtls_enabled: bool,
    /// Sentry identity, `<namespace>:<service-account>`
    pub identity: String,
}

/// Build the sidecar container for a pod with the given annotations
pub fn build_sidecar_container(
    annotations: Annotations<'_>,
    inputs: &SidecarInputs<'_>,
) -> Result<Container> {
    let (app_port, app_port_err) = annotations.i32_value(keys::APP_PORT);
    if let Some(e) = app_port_err {
        return Err(e);
    }
    let app_port_str = if app_port > 0 {
        app_port.to_string()
    } else {
        String::new()
    };

    let metrics_enabled = annotations.bool_or(keys::ENABLE_METRICS, defaults::METRICS_ENABLED);
    let metrics_port = annotations.i32_or(keys::METRICS_PORT, defaults::METRICS_PORT);
    let listen_addresses =
        annotations.string_or(keys::LISTEN_ADDRESSES, defaults::LISTEN_ADDRESSES);

    let (max_concurrency, err) = annotations.i32_value(keys::APP_MAX_CONCURRENCY);
    log_recoverable(err);
    let (max_request_size, err) = annotations.i32_value(keys::HTTP_MAX_REQUEST_SIZE);
    log_recoverable(err);
    let (read_buffer_size, err) = annotations.i32_value(keys::HTTP_READ_BUFFER_SIZE);
    log_recoverable(err);
    let (graceful_shutdown_seconds, err) = annotations.i32_value(keys::GRACEFUL_SHUTDOWN_SECONDS);
    log_recoverable(err);

    let mut ports = vec![
        container_port(HTTP_PORT_NAME, SIDECAR_HTTP_PORT),
        container_port(GRPC_PORT_NAME, SIDECAR_API_GRPC_PORT),
        container_port(INTERNAL_PORT_NAME, SIDECAR_INTERNAL_GRPC_PORT),
        container_port(METRICS_PORT_NAME, metrics_port),
    ];

    let mut command = vec![SIDECAR_BINARY.to_string()];

    let mut args = vec![
        "--mode".to_string(),
        "kubernetes".to_string(),
        "--app-http-port".to_string(),
        SIDECAR_HTTP_PORT.to_string(),
        "--app-grpc-port".to_string(),
        SIDECAR_API_GRPC_PORT.to_string(),
        "--app-internal-grpc-port".to_string(),
        SIDECAR_INTERNAL_GRPC_PORT.to_string(),
        "--app-listen-addresses".to_string(),
        listen_addresses,
        "--app-public-port".to_string(),
        SIDECAR_PUBLIC_PORT.to_string(),
        "--app-port".to_string(),
        app_port_str,
        "--app-id".to_string(),
        inputs.app_id.to_string(),
        "--control-plane-address".to_string(),
        inputs.control_plane_address.clone(),
        "--app-protocol".to_string(),
        annotations.string_or(keys::APP_PROTOCOL, defaults::APP_PROTOCOL),
        "--placement-host-address".to_string(),
        inputs.placement_address.clone(),
        "--config".to_string(),
        annotations.string(keys::CONFIG),
        "--log-level".to_string(),
        annotations.string_or(keys::LOG_LEVEL, defaults::LOG_LEVEL),
        "--app-max-concurrency".to_string(),
        max_concurrency.to_string(),
        "--sentry-address".to_string(),
        inputs.sentry_address.clone(),
        format!("--enable-metrics={metrics_enabled}"),
        "--metrics-port".to_string(),
        metrics_port.to_string(),
        "--app-http-max-request-size".to_string(),
        max_request_size.to_string(),
        "--app-http-read-buffer-size".to_string(),
        read_buffer_size.to_string(),
        "--app-graceful-shutdown-seconds".to_string(),
        graceful_shutdown_seconds.to_string(),
    ];

    if annotations.bool_or(keys::ENABLE_DEBUG, false) {
        let debug_port = annotations.i32_or(keys::DEBUG_PORT, defaults::DEBUG_PORT);
        ports.push(container_port(DEBUG_PORT_NAME, debug_port));

        command = vec![DEBUGGER_BINARY.to_string()];
        let mut debug_args = vec![
            format!("--listen=:{debug_port}"),
            "--accept-multiclient".to_string(),
            "--headless=true".to_string(),
            "--log".to_string(),
            "--api-version=2".to_string(),
            "exec".to_string(),
            SIDECAR_BINARY.to_string(),
            "--".to_string(),
        ];
        debug_args.append(&mut args);
        args = debug_args;
    }

    if annotations.bool_or(keys::LOG_AS_JSON, false) {
        args.push("--log-as-json".to_string());
    }
    if annotations.bool_or(keys::ENABLE_PROFILING, false) {
        args.push("--enable-profiling".to_string());
    }
    if inputs.mtls_enabled {
        args.push("--enable-mtls".to_string());
    }
    if annotations.bool_or(keys::APP_SSL, false) {
        args.push("--app-ssl".to_string());
    }
    if annotations.bool_or(keys::HTTP_STREAM_REQUEST_BODY, false) {
        args.push("--http-stream-request-body".to_string());
    }

    let mut env = vec![
        EnvVar {
            name: "NAMESPACE".to_string(),
            value: Some(inputs.namespace.to_string()),
            ..Default::default()
        },
        EnvVar {
            name: "POD_NAME".to_string(),
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    field_path: "metadata.name".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
    ];
    env.extend(parse_env_string(&annotations.string(keys::ENV)));
    env.extend([
        literal_env(TRUST_ANCHORS_ENV_VAR, &inputs.trust_anchors),
        literal_env(CERT_CHAIN_ENV_VAR, &inputs.cert_chain),
        literal_env(CERT_KEY_ENV_VAR, &inputs.cert_key),
        literal_env(SENTRY_LOCAL_IDENTITY_ENV_VAR, &inputs.identity),
    ]);

    let api_token_secret = annotations.string(keys::API_TOKEN_SECRET);
    if !api_token_secret.is_empty() {
        env.push(secret_env(API_TOKEN_ENV_VAR, &api_token_secret));
    }
    let app_token_secret = annotations.string(keys::APP_TOKEN_SECRET);
    if !app_token_secret.is_empty() {
        env.push(secret_env(APP_API_TOKEN_ENV_VAR, &app_token_secret));
    }

    let image = {
        let override_image = annotations.string(keys::SIDECAR_IMAGE);
        if override_image.is_empty() {
            inputs.image.to_string()
        } else {
            override_image
        }
    };

    let container = Container {
        name: SIDECAR_CONTAINER_NAME.to_string(),
        image: Some(image),
        image_pull_policy: Some(normalize_pull_policy(inputs.image_pull_policy)),
        security_context: Some(SecurityContext {
            allow_privilege_escalation: Some(false),
            ..Default::default()
        }),
        ports: Some(ports),
        command: Some(command),
        args: Some(args),
        env: Some(env),
        readiness_probe: Some(probe(
            annotations,
            keys::READINESS_PROBE_DELAY,
            keys::READINESS_PROBE_TIMEOUT,
            keys::READINESS_PROBE_PERIOD,
            keys::READINESS_PROBE_THRESHOLD,
        )),
        liveness_probe: Some(probe(
            annotations,
            keys::LIVENESS_PROBE_DELAY,
            keys::LIVENESS_PROBE_TIMEOUT,
            keys::LIVENESS_PROBE_PERIOD,
            keys::LIVENESS_PROBE_THRESHOLD,
        )),
        volume_mounts: inputs
            .token_volume_mount
            .as_ref()
            .map(|mount| vec![mount.clone()]),
        resources: resource_requirements(annotations)?,
        ..Default::default()
    };

    Ok(container)
}

fn log_recoverable(err: Option<Error>) {
    if let Some(e) = err {
        warn!(error = %e, "using default for unparseable annotation");
    }
}

fn container_port(name: &str, port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: port,
        ..Default::default()
    }
}

fn literal_env(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

fn secret_env(name: &str, secret_name: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                key: "token".to_string(),
                name: Some(secret_name.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn probe(
    annotations: Annotations<'_>,
    delay_key: &str,
    timeout_key: &str,
    period_key: &str,
    threshold_key: &str,
) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(HEALTHZ_PATH.to_string()),
            port: IntOrString::Int(SIDECAR_PUBLIC_PORT),
            ..Default::default()
        }),
        initial_delay_seconds: Some(annotations.i32_or(delay_key, defaults::PROBE_DELAY_SECONDS)),
        timeout_seconds: Some(annotations.i32_or(timeout_key, defaults::PROBE_TIMEOUT_SECONDS)),
        period_seconds: Some(annotations.i32_or(period_key, defaults::PROBE_PERIOD_SECONDS)),
        failure_threshold: Some(annotations.i32_or(threshold_key, defaults::PROBE_THRESHOLD)),
        ..Default::default()
    }
}

/// Build the resource section from annotations; omitted entirely when no
/// resource annotation is present
fn resource_requirements(annotations: Annotations<'_>) -> Result<Option<ResourceRequirements>> {
    let mut limits: BTreeMap<String, Quantity> = BTreeMap::new();
    let mut requests: BTreeMap<String, Quantity> = BTreeMap::new();

    if let Some(q) = annotations.quantity(keys::CPU_LIMIT)? {
        limits.insert("cpu".to_string(), q);
    }
    if let Some(q) = annotations.quantity(keys::MEMORY_LIMIT)? {
        limits.insert("memory".to_string(), q);
    }
    if let Some(q) = annotations.quantity(keys::CPU_REQUEST)? {
        requests.insert("cpu".to_string(), q);
    }
    if let Some(q) = annotations.quantity(keys::MEMORY_REQUEST)? {
        requests.insert("memory".to_string(), q);
    }

    if limits.is_empty() && requests.is_empty() {
        return Ok(None);
    }
    Ok(Some(ResourceRequirements {
        limits: if limits.is_empty() { None } else { Some(limits) },
        requests: if requests.is_empty() { None } else { Some(requests) },
        ..Default::default()
    }))
}

/// Find the service-account token mount to replicate onto the sidecar
pub fn token_volume_mount(pod: &Pod) -> Option<VolumeMount> {
    pod.spec.as_ref().and_then(|spec| {
        spec.containers.iter().find_map(|c| {
            c.volume_mounts
                .as_ref()?
                .iter()
                .find(|m| m.mount_path == KUBERNETES_MOUNT_PATH)
                .cloned()
        })
    })
}

fn normalize_pull_policy(policy: &str) -> String {
    match policy {
        "Always" | "Never" | "IfNotPresent" => policy.to_string(),
        _ => "IfNotPresent".to_string(),
    }
}
