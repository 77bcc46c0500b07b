//! WebSocket signaling transport.
//!
//! `GET /ws?publicKey=..&signature=..&displayName=..&avatar=..`
//!
//! Credentials are verified before the upgrade; a bad signature gets a plain
//! 401 and never reaches the socket. After the upgrade each connection runs
//! one task that reads command frames, forwards broadcast envelopes the
//! connection is entitled to, and feeds a writer task through a bounded queue.
//! When the socket ends the connection leaves every pod it was tracking.

use crate::actors::{ActorType, MailboxMonitor};
use crate::broadcast::ChannelBroadcaster;
use crate::errors::PodError;
use crate::identity::{IdentityVerifier, SignedChallenge};
use crate::pods::Caller;
use crate::signaling::{ConnectionSession, Reply, ServerMessage, SignalingDispatcher};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use common::types::ConnectionId;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument, warn};

/// Outbound frames queued per connection before new ones are dropped.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Longest display name kept, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 64;

/// Shared state for the signaling router.
pub struct AppState {
    pub dispatcher: SignalingDispatcher,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub broadcaster: ChannelBroadcaster,
    /// Cancelled when the service starts draining; open sockets close.
    pub shutdown: CancellationToken,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

/// Query parameters of the upgrade request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    #[serde(flatten)]
    pub credentials: SignedChallenge,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Router serving the signaling endpoint.
pub fn signaling_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConnectParams>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    let user_id = match state.verifier.verify(&params.credentials) {
        Ok(user_id) => user_id,
        Err(e) => {
            warn!(target: "pod.ws", error = %e, "Rejected connection");
            let err = PodError::from(e);
            return (StatusCode::UNAUTHORIZED, err.client_message()).into_response();
        }
    };

    let Some(ws) = ws else {
        return StatusCode::UPGRADE_REQUIRED.into_response();
    };

    if state.shutdown.is_cancelled() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let caller = build_caller(user_id, params.display_name, params.avatar);
    ws.on_upgrade(move |socket| handle_socket(socket, state, caller))
}

fn build_caller(
    user_id: common::types::UserId,
    display_name: Option<String>,
    avatar: Option<String>,
) -> Caller {
    let mut caller = Caller::new(user_id, ConnectionId::new());
    if let Some(name) = display_name
        .map(|n| n.trim().chars().take(MAX_DISPLAY_NAME_CHARS).collect::<String>())
        .filter(|n| !n.is_empty())
    {
        caller.display_name = name;
    }
    caller.avatar_reference = avatar.filter(|a| !a.is_empty());
    caller
}

#[instrument(skip_all, name = "pod.ws.connection", fields(connection_id = %caller.connection_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, caller: Caller) {
    let controller_metrics = Arc::clone(state.dispatcher.controller().controller_metrics());
    controller_metrics.connection_opened();

    info!(
        target: "pod.ws",
        user_id = %caller.user_id,
        connections = controller_metrics.connections(),
        "Connection established"
    );

    let (mut sink, mut stream) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_CAPACITY);
    let monitor = Arc::new(MailboxMonitor::new(
        ActorType::Connection,
        caller.connection_id.to_string(),
    ));

    let writer_monitor = Arc::clone(&monitor);
    let writer = tokio::spawn(async move {
        while let Some(text) = outbound_rx.recv().await {
            writer_monitor.record_dequeue();
            if let Err(e) = sink.send(Message::Text(text)).await {
                debug!(target: "pod.ws", error = %e, "Socket write failed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut events = state.broadcaster.subscribe();
    let mut session = ConnectionSession::new(caller, state.dispatcher.clone());

    loop {
        tokio::select! {
            () = state.shutdown.cancelled() => {
                debug!(target: "pod.ws", "Closing connection for shutdown");
                break;
            }

            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let reply = session.handle_text(&text).await;
                    if !enqueue(&outbound, &monitor, &ServerMessage::from(reply)) {
                        break;
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    let err = PodError::InvalidCommand("binary frame".to_string());
                    if !enqueue(&outbound, &monitor, &Reply::from_error(&err).into()) {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                // Ping/pong are answered by the socket itself
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(target: "pod.ws", error = %e, "Socket read failed");
                    break;
                }
            },

            received = events.recv() => match received {
                Ok(envelope) => {
                    if session.accepts(&envelope) && !enqueue(&outbound, &monitor, &envelope.message) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(target: "pod.ws", skipped, "Connection lagged behind broadcasts");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    let user_id = session.caller().user_id.clone();
    session.close().await;

    drop(outbound);
    let _ = writer.await;

    controller_metrics.connection_closed();
    info!(
        target: "pod.ws",
        user_id = %user_id,
        dropped = monitor.messages_dropped(),
        "Connection closed"
    );
}

/// Queue one message for the writer. Returns false once the writer is gone.
fn enqueue(
    outbound: &mpsc::Sender<String>,
    monitor: &MailboxMonitor,
    message: &ServerMessage,
) -> bool {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            warn!(target: "pod.ws", error = %e, "Failed to serialize outbound message");
            return true;
        }
    };

    monitor.record_enqueue();
    match outbound.try_send(text) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            // Slow reader: drop rather than stall broadcasts for everyone
            monitor.record_drop();
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            monitor.record_drop();
            false
        }
    }
}
