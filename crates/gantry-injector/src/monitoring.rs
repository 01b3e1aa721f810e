//! Injection counters
//!
//! Success/failure counts are tagged with the app ID so operators can see
//! which workloads fail to get a sidecar.

use metrics::counter;

/// Record one admission request hitting the webhook
pub fn record_injection_request() {
    counter!("gantry_injector_requests_total").increment(1);
}

/// Record a successful sidecar injection
pub fn record_successful_injection(app_id: &str) {
    counter!("gantry_injector_injections_total", "app_id" => app_id.to_string()).increment(1);
}

/// Record a failed sidecar injection with the failing stage
pub fn record_failed_injection(app_id: &str, reason: &str) {
    counter!(
        "gantry_injector_failures_total",
        "app_id" => app_id.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}
