//! Typed access to the pod annotation bundle
//!
//! Every recognized annotation has a type and a default. Booleans accept
//! `y/yes/true/on/1` (case-insensitive); anything else present is false.
//! Integer parse failures are recoverable (the caller logs and keeps the
//! default); CPU/memory quantity parse failures are hard errors.

use std::collections::BTreeMap;

use gantry_common::{Error, Result};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

/// Recognized annotation keys, all under the `gantry.dev/` prefix
pub mod keys {
    /// Opt the pod into sidecar injection
    pub const ENABLED: &str = "gantry.dev/enabled";
    /// App ID; defaults to the pod name
    pub const APP_ID: &str = "gantry.dev/app-id";
    /// Port the user application listens on
    pub const APP_PORT: &str = "gantry.dev/app-port";
    /// Protocol the user application speaks
    pub const APP_PROTOCOL: &str = "gantry.dev/app-protocol";
    /// The user application serves TLS
    pub const APP_SSL: &str = "gantry.dev/app-ssl";
    /// Configuration resource applied to the sidecar
    pub const CONFIG: &str = "gantry.dev/config";
    /// Sidecar log level
    pub const LOG_LEVEL: &str = "gantry.dev/log-level";
    /// Emit sidecar logs as JSON
    pub const LOG_AS_JSON: &str = "gantry.dev/log-as-json";
    /// Enable profiling endpoints
    pub const ENABLE_PROFILING: &str = "gantry.dev/enable-profiling";
    /// Enable metrics collection
    pub const ENABLE_METRICS: &str = "gantry.dev/enable-metrics";
    /// Metrics port
    pub const METRICS_PORT: &str = "gantry.dev/metrics-port";
    /// Run the sidecar under the debugger entrypoint
    pub const ENABLE_DEBUG: &str = "gantry.dev/enable-debug";
    /// Debugger port
    pub const DEBUG_PORT: &str = "gantry.dev/debug-port";
    /// Extra environment variables, comma-separated `NAME=value` pairs
    pub const ENV: &str = "gantry.dev/env";
    /// Secret holding the Gantry API token
    pub const API_TOKEN_SECRET: &str = "gantry.dev/api-token-secret";
    /// Secret holding the application API token
    pub const APP_TOKEN_SECRET: &str = "gantry.dev/app-token-secret";
    /// Maximum concurrent app invocations
    pub const APP_MAX_CONCURRENCY: &str = "gantry.dev/app-max-concurrency";
    /// Sidecar CPU limit
    pub const CPU_LIMIT: &str = "gantry.dev/sidecar-cpu-limit";
    /// Sidecar memory limit
    pub const MEMORY_LIMIT: &str = "gantry.dev/sidecar-memory-limit";
    /// Sidecar CPU request
    pub const CPU_REQUEST: &str = "gantry.dev/sidecar-cpu-request";
    /// Sidecar memory request
    pub const MEMORY_REQUEST: &str = "gantry.dev/sidecar-memory-request";
    /// Addresses the sidecar listens on
    pub const LISTEN_ADDRESSES: &str = "gantry.dev/sidecar-listen-addresses";
    /// Liveness probe initial delay seconds
    pub const LIVENESS_PROBE_DELAY: &str = "gantry.dev/sidecar-liveness-probe-delay-seconds";
    /// Liveness probe timeout seconds
    pub const LIVENESS_PROBE_TIMEOUT: &str = "gantry.dev/sidecar-liveness-probe-timeout-seconds";
    /// Liveness probe period seconds
    pub const LIVENESS_PROBE_PERIOD: &str = "gantry.dev/sidecar-liveness-probe-period-seconds";
    /// Liveness probe failure threshold
    pub const LIVENESS_PROBE_THRESHOLD: &str = "gantry.dev/sidecar-liveness-probe-threshold";
    /// Readiness probe initial delay seconds
    pub const READINESS_PROBE_DELAY: &str = "gantry.dev/sidecar-readiness-probe-delay-seconds";
    /// Readiness probe timeout seconds
    pub const READINESS_PROBE_TIMEOUT: &str = "gantry.dev/sidecar-readiness-probe-timeout-seconds";
    /// Readiness probe period seconds
    pub const READINESS_PROBE_PERIOD: &str = "gantry.dev/sidecar-readiness-probe-period-seconds";
    /// Readiness probe failure threshold
    pub const READINESS_PROBE_THRESHOLD: &str = "gantry.dev/sidecar-readiness-probe-threshold";
    /// Override of the sidecar image
    pub const SIDECAR_IMAGE: &str = "gantry.dev/sidecar-image";
    /// Maximum HTTP request body size in MB
    pub const HTTP_MAX_REQUEST_SIZE: &str = "gantry.dev/http-max-request-size";
    /// HTTP read buffer size in KB
    pub const HTTP_READ_BUFFER_SIZE: &str = "gantry.dev/http-read-buffer-size";
    /// Stream HTTP request bodies instead of buffering
    pub const HTTP_STREAM_REQUEST_BODY: &str = "gantry.dev/http-stream-request-body";
    /// Seconds granted to in-flight work at shutdown
    pub const GRACEFUL_SHUTDOWN_SECONDS: &str = "gantry.dev/graceful-shutdown-seconds";
}

/// Stable annotation defaults
pub mod defaults {
    /// Default sidecar log level
    pub const LOG_LEVEL: &str = "info";
    /// Default sidecar listen addresses
    pub const LISTEN_ADDRESSES: &str = "[::1],127.0.0.1";
    /// Default application protocol
    pub const APP_PROTOCOL: &str = "http";
    /// Default metrics port
    pub const METRICS_PORT: i32 = 9090;
    /// Default debugger port
    pub const DEBUG_PORT: i32 = 40000;
    /// Whether metrics are collected by default
    pub const METRICS_ENABLED: bool = true;
    /// Default probe initial delay
    pub const PROBE_DELAY_SECONDS: i32 = 3;
    /// Default probe timeout
    pub const PROBE_TIMEOUT_SECONDS: i32 = 3;
    /// Default probe period
    pub const PROBE_PERIOD_SECONDS: i32 = 6;
    /// Default probe failure threshold
    pub const PROBE_THRESHOLD: i32 = 3;
}

/// Typed view over a pod's annotation map
#[derive(Clone, Copy)]
pub struct Annotations<'a> {
    map: &'a BTreeMap<String, String>,
}

impl<'a> Annotations<'a> {
    /// Wrap an annotation map
    pub fn new(map: &'a BTreeMap<String, String>) -> Self {
        Self { map }
    }

    fn get(&self, key: &str) -> Option<&'a str> {
        self.map.get(key).map(String::as_str)
    }

    /// Raw string value, empty when absent
    pub fn string(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_string()
    }

    /// String value, with `default` when absent or empty
    pub fn string_or(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => default.to_string(),
        }
    }

    /// Boolean value: `y`, `yes`, `true`, `on`, `1` (any case) are true;
    /// any other present value is false; absent yields `default`
    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(v) => matches!(v.to_lowercase().as_str(), "y" | "yes" | "true" | "on" | "1"),
            None => default,
        }
    }

    /// Integer value with `default` when absent or unparseable
    pub fn i32_or(&self, key: &str, default: i32) -> i32 {
        self.get(key)
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(default)
    }

    /// Integer value; absent yields `-1`, an unparseable value yields `-1`
    /// alongside a recoverable error for the caller to log
    pub fn i32_value(&self, key: &str) -> (i32, Option<Error>) {
        match self.get(key) {
            None => (-1, None),
            Some(v) => match v.parse::<i32>() {
                Ok(n) => (n, None),
                Err(e) => (
                    -1,
                    Some(Error::annotation(key, format!("parsing int value {v}: {e}"))),
                ),
            },
        }
    }

    /// Resource quantity; absent yields `None`, an invalid quantity is a
    /// hard error
    pub fn quantity(&self, key: &str) -> Result<Option<Quantity>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => parse_quantity(v)
                .map(Some)
                .map_err(|msg| Error::annotation(key, msg)),
        }
    }
}

/// Validate a Kubernetes resource quantity.
///
/// Grammar: optional sign, a decimal number, then either a binary-SI /
/// decimal-SI suffix (`Ki Mi Gi Ti Pi Ei n u m k M G T P E`) or a decimal
/// exponent (`e3`, `E-2`).
pub fn parse_quantity(value: &str) -> std::result::Result<Quantity, String> {
    let s = value.trim();
    if s.is_empty() {
        return Err("quantity is empty".to_string());
    }

    let rest = s.strip_prefix(['+', '-']).unwrap_or(s);

    // Number part: digits with at most one decimal point, at least one digit
    let number_len = rest
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(rest.len());
    let (number, suffix) = rest.split_at(number_len);
    if number.is_empty()
        || number.chars().filter(|&c| c == '.').count() > 1
        || !number.chars().any(|c| c.is_ascii_digit())
    {
        return Err(format!("invalid number in quantity {value:?}"));
    }

    let valid_suffix = match suffix {
        "" | "n" | "u" | "m" | "k" | "M" | "G" | "T" | "P" | "E" | "Ki" | "Mi" | "Gi" | "Ti"
        | "Pi" | "Ei" => true,
        exp if exp.starts_with(['e', 'E']) => {
            let digits = exp[1..].strip_prefix(['+', '-']).unwrap_or(&exp[1..]);
            !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    };
    if !valid_suffix {
        return Err(format!("invalid suffix {suffix:?} in quantity {value:?}"));
    }

    Ok(Quantity(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotations(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn bool_truthy_values() {
        for v in ["y", "yes", "true", "on", "1", "Y", "YES", "True", "ON"] {
            let map = annotations(&[(keys::ENABLED, v)]);
            assert!(Annotations::new(&map).bool_or(keys::ENABLED, false), "{v}");
        }
    }

    #[test]
    fn bool_present_but_falsey_ignores_default() {
        let map = annotations(&[(keys::ENABLED, "nope")]);
        assert!(!Annotations::new(&map).bool_or(keys::ENABLED, true));
    }

    #[test]
    fn bool_absent_uses_default() {
        let map = annotations(&[]);
        assert!(Annotations::new(&map).bool_or(keys::ENABLE_METRICS, true));
        assert!(!Annotations::new(&map).bool_or(keys::ENABLED, false));
    }

    #[test]
    fn i32_or_falls_back_on_garbage() {
        let map = annotations(&[(keys::METRICS_PORT, "not-a-number")]);
        assert_eq!(
            Annotations::new(&map).i32_or(keys::METRICS_PORT, defaults::METRICS_PORT),
            9090
        );
    }

    #[test]
    fn i32_value_reports_recoverable_error() {
        let map = annotations(&[(keys::APP_PORT, "80x")]);
        let (value, err) = Annotations::new(&map).i32_value(keys::APP_PORT);
        assert_eq!(value, -1);
        assert!(err.unwrap().to_string().contains("gantry.dev/app-port"));

        let map = annotations(&[]);
        let (value, err) = Annotations::new(&map).i32_value(keys::APP_PORT);
        assert_eq!(value, -1);
        assert!(err.is_none());
    }

    #[test]
    fn string_or_treats_empty_as_absent() {
        let map = annotations(&[(keys::LOG_LEVEL, "")]);
        assert_eq!(
            Annotations::new(&map).string_or(keys::LOG_LEVEL, defaults::LOG_LEVEL),
            "info"
        );
    }

    #[test]
    fn quantities_accept_standard_units() {
        for q in ["100m", "0.5", "1", "128Mi", "1Gi", "2k", "1e3", "1.5E2", "+2", "250n"] {
            assert!(parse_quantity(q).is_ok(), "{q} should parse");
        }
    }

    #[test]
    fn quantities_reject_garbage() {
        for q in ["", "abc", "1..5", "100mb", "Mi", "1 Gi", "1ee3", "1e"] {
            assert!(parse_quantity(q).is_err(), "{q} should fail");
        }
    }

    #[test]
    fn quantity_getter_is_a_hard_error_on_garbage() {
        let map = annotations(&[(keys::CPU_LIMIT, "lots")]);
        assert!(Annotations::new(&map).quantity(keys::CPU_LIMIT).is_err());

        let map = annotations(&[]);
        assert!(Annotations::new(&map)
            .quantity(keys::CPU_LIMIT)
            .unwrap()
            .is_none());
    }
}
