//! In-memory [`EventBroadcaster`] that records every envelope.
//!
//! ```rust,ignore
//! let recorder = Arc::new(RecordingBroadcaster::new());
//! let dispatcher = SignalingDispatcher::new(controller, recorder.clone());
//! // ...
//! assert_eq!(recorder.event_names(&pod_id), vec!["user-joined", "pod-stats-updated"]);
//! ```

use common::types::{PodId, UserId};
use pod_service::broadcast::{Audience, Envelope, EventBroadcaster};
use pod_service::signaling::{PodEvent, ServerMessage};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    envelopes: Mutex<Vec<Envelope>>,
}

impl RecordingBroadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in order.
    #[must_use]
    pub fn envelopes(&self) -> Vec<Envelope> {
        self.envelopes.lock().expect("recorder lock").clone()
    }

    /// Events broadcast to one pod, in order.
    #[must_use]
    pub fn events_for(&self, pod_id: &PodId) -> Vec<PodEvent> {
        self.envelopes()
            .into_iter()
            .filter(|e| e.audience == Audience::Pod(pod_id.clone()))
            .filter_map(|e| match e.message {
                ServerMessage::Event(event) => Some(event),
                ServerMessage::Reply(_) => None,
            })
            .collect()
    }

    /// Names of events broadcast to one pod, in order.
    #[must_use]
    pub fn event_names(&self, pod_id: &PodId) -> Vec<&'static str> {
        self.events_for(pod_id).iter().map(PodEvent::name).collect()
    }

    /// Private messages sent to one user.
    #[must_use]
    pub fn messages_for_user(&self, user_id: &UserId) -> Vec<ServerMessage> {
        self.envelopes()
            .into_iter()
            .filter(|e| e.audience == Audience::User(user_id.clone()))
            .map(|e| e.message)
            .collect()
    }

    pub fn clear(&self) {
        self.envelopes.lock().expect("recorder lock").clear();
    }

    fn push(&self, envelope: Envelope) {
        self.envelopes.lock().expect("recorder lock").push(envelope);
    }
}

impl EventBroadcaster for RecordingBroadcaster {
    fn broadcast(&self, pod_id: &PodId, event: PodEvent) {
        self.push(Envelope {
            audience: Audience::Pod(pod_id.clone()),
            message: event.into(),
        });
    }

    fn notify_user(&self, user_id: &UserId, message: ServerMessage) {
        self.push(Envelope {
            audience: Audience::User(user_id.clone()),
            message,
        });
    }
}
