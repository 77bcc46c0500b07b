//! Metrics definitions for the pod service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `pod_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `command`: 13 values (one per `PodCommand` variant)
//! - `outcome`: 3 values (applied, noop, error)
//! - `actor_type`: 2 values (shard, connection)

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle for rendering
/// `/metrics`.
///
/// Must be called before any metrics are recorded. Command latency buckets
/// target in-process work (sub-millisecond to one second).
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("pod_command".to_string()),
            &[
                0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set command latency buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Gauges
// ============================================================================

/// Metric: `pod_pods_active`
pub fn set_pods_active(count: usize) {
    // Realistic counts are far below 2^53
    #[allow(clippy::cast_precision_loss)]
    gauge!("pod_pods_active").set(count as f64);
}

/// Metric: `pod_connections_active`
pub fn set_connections_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("pod_connections_active").set(count as f64);
}

/// Set the mailbox depth for an actor type.
///
/// Metric: `pod_actor_mailbox_depth`
/// Labels: `actor_type`
///
/// High values indicate the actor is falling behind.
pub fn set_actor_mailbox_depth(actor_type: &str, depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("pod_actor_mailbox_depth", "actor_type" => actor_type.to_string()).set(depth as f64);
}

// ============================================================================
// Commands
// ============================================================================

/// Record one dispatched command.
///
/// Metrics: `pod_commands_total` (labels: `command`, `outcome`) and
/// `pod_command_latency_seconds` (labels: `command`).
pub fn record_command(command: &str, outcome: &str, duration: Duration) {
    counter!(
        "pod_commands_total",
        "command" => command.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!("pod_command_latency_seconds", "command" => command.to_string())
        .record(duration.as_secs_f64());
}

/// Metric: `pod_teardowns_total`
///
/// Incremented when the last member leaves and a pod is removed.
pub fn record_teardown() {
    counter!("pod_teardowns_total").increment(1);
}

/// Record an actor panic event.
///
/// Metric: `pod_actor_panics_total`
/// Labels: `actor_type`
///
/// ALERT: Any non-zero value indicates a bug.
pub fn record_actor_panic(actor_type: &str) {
    counter!("pod_actor_panics_total", "actor_type" => actor_type.to_string()).increment(1);
}
