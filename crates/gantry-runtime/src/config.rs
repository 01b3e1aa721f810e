//! Sidecar runtime configuration
//!
//! The flag set mirrors the argument vector the injector synthesizes for the
//! sidecar container; in standalone mode the same binary is driven by hand
//! or by a local CLI.

use clap::{Parser, ValueEnum};
use gantry_common::{SIDECAR_API_GRPC_PORT, SIDECAR_HTTP_PORT, SIDECAR_INTERNAL_GRPC_PORT, SIDECAR_PUBLIC_PORT};

/// How the sidecar discovers its component definitions
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Definitions come from the operator over gRPC
    Kubernetes,
    /// Definitions come from a local directory
    Standalone,
}

/// Runtime configuration, assembled from flags and environment
#[derive(Clone, Debug, Parser)]
#[command(name = "gantryd", about = "Gantry application sidecar", allow_negative_numbers = true)]
pub struct RuntimeConfig {
    /// Runtime mode
    #[arg(long, value_enum, default_value = "standalone")]
    pub mode: Mode,

    /// HTTP port of the sidecar data plane
    #[arg(long = "app-http-port", default_value_t = SIDECAR_HTTP_PORT as u16)]
    pub app_http_port: u16,

    /// API gRPC port of the sidecar
    #[arg(long = "app-grpc-port", default_value_t = SIDECAR_API_GRPC_PORT as u16)]
    pub app_grpc_port: u16,

    /// Internal gRPC port (sidecar to sidecar)
    #[arg(long = "app-internal-grpc-port", default_value_t = SIDECAR_INTERNAL_GRPC_PORT as u16)]
    pub app_internal_grpc_port: u16,

    /// Comma-separated addresses the sidecar listens on
    #[arg(long = "app-listen-addresses", default_value = "[::1],127.0.0.1")]
    pub app_listen_addresses: String,

    /// Public (health/metadata) port
    #[arg(long = "app-public-port", default_value_t = SIDECAR_PUBLIC_PORT as u16)]
    pub app_public_port: u16,

    /// Port the user application listens on; empty when the app exposes none
    #[arg(long = "app-port", default_value = "")]
    pub app_port: String,

    /// Application ID
    #[arg(long = "app-id")]
    pub app_id: String,

    /// Address of the operator API
    #[arg(long = "control-plane-address", default_value = "")]
    pub control_plane_address: String,

    /// Protocol the user application speaks (http or grpc)
    #[arg(long = "app-protocol", default_value = "http")]
    pub app_protocol: String,

    /// Address of the placement service
    #[arg(long = "placement-host-address", default_value = "")]
    pub placement_host_address: String,

    /// Name of the configuration resource to apply
    #[arg(long = "config", default_value = "")]
    pub config: String,

    /// Log level
    #[arg(long = "log-level", default_value = "info")]
    pub log_level: String,

    /// Maximum concurrent app invocations; -1 means unlimited
    #[arg(long = "app-max-concurrency", default_value_t = -1)]
    pub app_max_concurrency: i32,

    /// Address of the sentry certificate authority
    #[arg(long = "sentry-address", default_value = "")]
    pub sentry_address: String,

    /// Whether metrics collection is enabled; injected as `--enable-metrics=<bool>`
    #[arg(long = "enable-metrics", default_value_t = true, action = clap::ArgAction::Set)]
    pub enable_metrics: bool,

    /// Metrics port
    #[arg(long = "metrics-port", default_value_t = 9090)]
    pub metrics_port: u16,

    /// Maximum HTTP request body size in MB; -1 means default
    #[arg(long = "app-http-max-request-size", default_value_t = -1)]
    pub app_http_max_request_size: i32,

    /// HTTP read buffer size in KB; -1 means default
    #[arg(long = "app-http-read-buffer-size", default_value_t = -1)]
    pub app_http_read_buffer_size: i32,

    /// Seconds granted to in-flight work at shutdown; -1 means default
    #[arg(long = "app-graceful-shutdown-seconds", default_value_t = -1)]
    pub app_graceful_shutdown_seconds: i32,

    /// Emit logs as JSON
    #[arg(long = "log-as-json", default_value_t = false)]
    pub log_as_json: bool,

    /// Enable profiling endpoints
    #[arg(long = "enable-profiling", default_value_t = false)]
    pub enable_profiling: bool,

    /// Enable mutual TLS to the control plane
    #[arg(long = "enable-mtls", default_value_t = false)]
    pub enable_mtls: bool,

    /// The user application serves TLS
    #[arg(long = "app-ssl", default_value_t = false)]
    pub app_ssl: bool,

    /// Stream HTTP request bodies instead of buffering
    #[arg(long = "http-stream-request-body", default_value_t = false)]
    pub http_stream_request_body: bool,

    /// Directory of component manifests (standalone mode)
    #[arg(long = "components-path", default_value = "./components")]
    pub components_path: String,

    /// Namespace this sidecar runs in
    #[arg(long, env = "NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// Pod name of this sidecar
    #[arg(long, env = "POD_NAME", default_value = "")]
    pub pod_name: String,
}
