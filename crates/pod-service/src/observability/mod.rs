//! Observability for the pod service.
//!
//! # Metrics
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `pod_pods_active` | Gauge | - |
//! | `pod_connections_active` | Gauge | - |
//! | `pod_commands_total` | Counter | `command`, `outcome` |
//! | `pod_command_latency_seconds` | Histogram | `command` |
//! | `pod_teardowns_total` | Counter | - |
//! | `pod_actor_mailbox_depth` | Gauge | `actor_type` |
//! | `pod_actor_panics_total` | Counter | `actor_type` |
//!
//! # Privacy
//!
//! Labels never carry pod ids, user ids or content references.

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use metrics::init_metrics_recorder;
