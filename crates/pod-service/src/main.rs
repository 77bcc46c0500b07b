//! Pod Service
//!
//! In-memory session manager for live audio/video pods with WebSocket
//! signaling.
//!
//! # Servers
//!
//! - WebSocket signaling server (default: 0.0.0.0:8080, path `/ws`)
//! - HTTP server for health and metrics (default: 0.0.0.0:8081)
//!
//! # Startup Flow
//!
//! 1. Initialize tracing from `RUST_LOG` / `POD_LOG_LEVEL`
//! 2. Load configuration from environment
//! 3. Initialize Prometheus metrics recorder
//! 4. Spawn the shard actors (`PodController`)
//! 5. Start health HTTP server (liveness, readiness, metrics)
//! 6. Start signaling server, then mark ready
//! 7. Wait for shutdown signal
//!
//! # Shutdown
//!
//! Readiness drops first, open sockets are closed (each leaves its pods as
//! if the client had sent `leave`), then the shard actors are cancelled.

#![warn(clippy::pedantic)]
#![allow(clippy::too_many_lines)] // main.rs orchestrates startup, naturally longer

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use common::config::ObservabilityConfig;
use pod_service::actors::{ActorMetrics, ControllerMetrics, PodController};
use pod_service::broadcast::ChannelBroadcaster;
use pod_service::config::Config;
use pod_service::identity::Ed25519ChallengeVerifier;
use pod_service::observability::{health_router, init_metrics_recorder, HealthState};
use pod_service::signaling::SignalingDispatcher;
use pod_service::ws::{signaling_router, AppState};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Upper bound on waiting for open connections to leave their pods.
const CONNECTION_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

const CONNECTION_DRAIN_POLL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_vars: HashMap<String, String> = std::env::vars().collect();
    init_tracing(&ObservabilityConfig::from_vars(&env_vars));

    info!("Starting Pod Service");

    let config = Config::from_vars(&env_vars).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        instance_id = %config.instance_id,
        bind_address = %config.bind_address,
        health_bind_address = %config.health_bind_address,
        shard_count = config.shard_count,
        max_pods = config.max_pods,
        max_members_per_pod = config.max_members_per_pod,
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;
    info!("Prometheus metrics recorder initialized");

    let health_state = Arc::new(HealthState::new());

    let actor_metrics = ActorMetrics::new();
    let controller_metrics = ControllerMetrics::new();
    let controller = PodController::new(
        config.instance_id.clone(),
        config.limits(),
        actor_metrics,
        Arc::clone(&controller_metrics),
    );
    info!("Actor system initialized");

    let broadcaster = ChannelBroadcaster::default();
    let dispatcher = SignalingDispatcher::new(controller.clone(), Arc::new(broadcaster.clone()));
    let verifier = Arc::new(Ed25519ChallengeVerifier::new(config.auth_challenge.clone()));

    let shutdown_token = CancellationToken::new();

    // Health server (MUST succeed - fail startup if it doesn't)
    let health_addr: SocketAddr = config.health_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.health_bind_address, "Invalid health bind address");
        format!("Invalid health bind address: {e}")
    })?;

    let metrics_router = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );
    let health_app = health_router(Arc::clone(&health_state)).merge(metrics_router);

    // Bind listeners BEFORE spawning to fail fast on bind errors
    let health_listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %health_addr, "Failed to bind health server");
            format!("Failed to bind health server to {health_addr}: {e}")
        })?;

    let health_shutdown_token = shutdown_token.child_token();
    tokio::spawn(async move {
        let server = axum::serve(health_listener, health_app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });
    info!(addr = %health_addr, "Health server started");

    // Signaling server
    let signaling_addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.bind_address, "Invalid signaling bind address");
        format!("Invalid signaling bind address: {e}")
    })?;

    let app_state = Arc::new(AppState {
        dispatcher,
        verifier,
        broadcaster,
        shutdown: shutdown_token.child_token(),
    });

    let signaling_listener = tokio::net::TcpListener::bind(signaling_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %signaling_addr, "Failed to bind signaling server");
            format!("Failed to bind signaling server to {signaling_addr}: {e}")
        })?;

    let signaling_shutdown_token = shutdown_token.child_token();
    tokio::spawn(async move {
        let server = axum::serve(signaling_listener, signaling_router(app_state))
            .with_graceful_shutdown(async move {
                signaling_shutdown_token.cancelled().await;
                info!("Signaling server shutting down");
            });
        if let Err(e) = server.await {
            error!(error = %e, "Signaling server failed");
        }
    });
    info!(addr = %signaling_addr, "Signaling server started");

    health_state.set_ready();
    info!("Pod Service running - press Ctrl+C to shutdown");

    shutdown_signal().await;
    info!("Shutdown signal received, initiating graceful shutdown...");

    // Mark as not ready immediately so the load balancer stops sending traffic
    health_state.set_not_ready();
    shutdown_token.cancel();

    drain_connections(&controller_metrics).await;

    controller.shutdown();

    info!("Pod Service shutdown complete");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over `POD_LOG_LEVEL`.
fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&observability.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let json = observability.json_logs;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

/// Wait for open connections to close and leave their pods.
async fn drain_connections(controller_metrics: &ControllerMetrics) {
    let deadline = tokio::time::Instant::now() + CONNECTION_DRAIN_TIMEOUT;

    while controller_metrics.connections() > 0 {
        if tokio::time::Instant::now() >= deadline {
            warn!(
                remaining = controller_metrics.connections(),
                "Connections still open after drain timeout"
            );
            return;
        }
        tokio::time::sleep(CONNECTION_DRAIN_POLL).await;
    }
    info!("All connections drained");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. Without them the service
/// cannot shut down gracefully.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
