//! Fan-out of pod events to connected clients.
//!
//! The dispatcher publishes envelopes addressed either to a pod (every
//! member connection) or to a single user (every connection of that user).
//! Each connection task subscribes and filters by what it has joined.

use crate::signaling::events::{PodEvent, ServerMessage};
use common::types::{PodId, UserId};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Default capacity of the fan-out channel. Slow receivers that fall this
/// far behind miss messages and are told how many.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 1024;

/// Who an envelope is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Pod(PodId),
    User(UserId),
}

/// An addressed outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub audience: Audience,
    pub message: ServerMessage,
}

/// Delivery seam between the dispatcher and the transport.
pub trait EventBroadcaster: Send + Sync {
    /// Deliver an event to every member of a pod.
    fn broadcast(&self, pod_id: &PodId, event: PodEvent);

    /// Deliver a message privately to one user.
    fn notify_user(&self, user_id: &UserId, message: ServerMessage);
}

/// [`EventBroadcaster`] over a `tokio::sync::broadcast` channel.
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    sender: broadcast::Sender<Arc<Envelope>>,
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_BROADCAST_CAPACITY)
    }
}

impl ChannelBroadcaster {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// New receiver for one connection.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Envelope>> {
        self.sender.subscribe()
    }

    fn publish(&self, envelope: Envelope) {
        // No receivers simply means nobody is connected.
        if let Err(e) = self.sender.send(Arc::new(envelope)) {
            debug!(target: "pod.broadcast", audience = ?e.0.audience, "No subscribers for envelope");
        }
    }
}

impl EventBroadcaster for ChannelBroadcaster {
    fn broadcast(&self, pod_id: &PodId, event: PodEvent) {
        self.publish(Envelope {
            audience: Audience::Pod(pod_id.clone()),
            message: event.into(),
        });
    }

    fn notify_user(&self, user_id: &UserId, message: ServerMessage) {
        self.publish(Envelope {
            audience: Audience::User(user_id.clone()),
            message,
        });
    }
}
