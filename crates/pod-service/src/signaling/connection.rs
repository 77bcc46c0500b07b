//! Per-connection signaling state.
//!
//! A `ConnectionSession` remembers which pods its connection has joined or
//! asked to join. That set decides which broadcasts are forwarded. On close
//! every tracked pod is left, but only records this connection created are
//! removed; another socket of the same user keeps its membership.
//!
//! When the user's membership goes away through another connection, the
//! `user-left` broadcast for this user stops the session tracking the pod.

use crate::broadcast::{Audience, Envelope};
use crate::pods::Caller;

use super::commands::PodCommand;
use super::dispatcher::SignalingDispatcher;
use super::events::{PodEvent, Reply, ServerMessage};

use common::types::PodId;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Signaling state for one authenticated connection.
#[derive(Debug)]
pub struct ConnectionSession {
    caller: Caller,
    dispatcher: SignalingDispatcher,
    /// Pods this connection is a member of.
    joined: BTreeSet<PodId>,
    /// Pods with a pending join request from this connection.
    pending: BTreeSet<PodId>,
}

impl ConnectionSession {
    #[must_use]
    pub fn new(caller: Caller, dispatcher: SignalingDispatcher) -> Self {
        Self {
            caller,
            dispatcher,
            joined: BTreeSet::new(),
            pending: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn caller(&self) -> &Caller {
        &self.caller
    }

    /// Pods this connection currently belongs to.
    #[must_use]
    pub fn joined(&self) -> &BTreeSet<PodId> {
        &self.joined
    }

    /// Pods this connection is waiting to be admitted to.
    #[must_use]
    pub fn pending(&self) -> &BTreeSet<PodId> {
        &self.pending
    }

    /// Parse and run one inbound text frame.
    pub async fn handle_text(&mut self, text: &str) -> Reply {
        match PodCommand::parse(text) {
            Ok(command) => self.handle_command(command).await,
            Err(err) => {
                debug!(target: "pod.signaling", error = %err, "Unparseable command");
                Reply::from_error(&err)
            }
        }
    }

    /// Run one command and update the tracked pod sets from the reply.
    pub async fn handle_command(&mut self, command: PodCommand) -> Reply {
        let reply = self.dispatcher.dispatch(&self.caller, command).await;
        self.track(&reply);
        reply
    }

    fn track(&mut self, reply: &Reply) {
        match reply {
            Reply::PodCreated { pod } | Reply::Joined { pod } => {
                self.pending.remove(&pod.pod.id);
                self.joined.insert(pod.pod.id.clone());
            }
            Reply::JoinRequested { pod_id } => {
                self.pending.insert(pod_id.clone());
            }
            Reply::Left { pod_id } => {
                self.joined.remove(pod_id);
                self.pending.remove(pod_id);
            }
            _ => {}
        }
    }

    /// Whether a broadcast envelope should be written to this connection.
    ///
    /// A private `joined` notification (admission by a host) also moves the
    /// pod from pending to joined.
    pub fn accepts(&mut self, envelope: &Envelope) -> bool {
        match &envelope.audience {
            Audience::Pod(pod_id) => {
                if !self.joined.contains(pod_id) {
                    return false;
                }
                if let ServerMessage::Event(PodEvent::UserLeft { user_id, .. }) = &envelope.message
                {
                    if user_id == &self.caller.user_id {
                        self.joined.remove(pod_id);
                    }
                }
                true
            }
            Audience::User(user_id) => {
                if user_id != &self.caller.user_id {
                    return false;
                }
                if let ServerMessage::Reply(reply) = &envelope.message {
                    // Only the connection that asked is admitted
                    if let Reply::Joined { pod } = reply {
                        if !self.pending.contains(&pod.pod.id) {
                            return false;
                        }
                    }
                    self.track(reply);
                }
                true
            }
        }
    }

    /// Leave every tracked pod. Called once when the transport closes.
    pub async fn close(mut self) {
        let pods: Vec<PodId> = self
            .joined
            .iter()
            .chain(self.pending.iter())
            .cloned()
            .collect();

        info!(
            target: "pod.signaling",
            connection_id = %self.caller.connection_id,
            pods = pods.len(),
            "Connection closed, leaving tracked pods"
        );

        for pod_id in pods {
            let reply = self.dispatcher.disconnect(&self.caller, pod_id).await;
            self.track(&reply);
        }
    }
}
