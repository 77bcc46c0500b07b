//! Outbound messages: pod broadcasts and direct replies.
//!
//! Both enums are internally tagged on `type`, so a client can tell them
//! apart without an envelope.

use crate::errors::PodError;
use crate::pods::{AccessType, MediaChannel, Member, PodSnapshot, PodStats};
use common::types::{PodId, UserId};
use serde::Serialize;

/// State change broadcast to every member of a pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum PodEvent {
    UserJoined {
        pod_id: PodId,
        member: Member,
    },
    UserLeft {
        pod_id: PodId,
        user_id: UserId,
    },
    PodTypeChanged {
        pod_id: PodId,
        access_type: AccessType,
        /// Requesters admitted by opening the pod.
        admitted: Vec<UserId>,
    },
    ContentUpdated {
        pod_id: PodId,
        content_reference: String,
    },
    CoHostApproved {
        pod_id: PodId,
        user_id: UserId,
        hosts: Vec<UserId>,
    },
    JoinRequestApproved {
        pod_id: PodId,
        member: Member,
    },
    AllJoinRequestsApproved {
        pod_id: PodId,
        members: Vec<Member>,
    },
    UserAudioToggle {
        pod_id: PodId,
        user_id: UserId,
        enabled: bool,
    },
    UserVideoToggle {
        pod_id: PodId,
        user_id: UserId,
        enabled: bool,
    },
    UserMuted {
        pod_id: PodId,
        user_id: UserId,
        channel: MediaChannel,
        muted: bool,
        muted_by: UserId,
    },
    AllUsersMuted {
        pod_id: PodId,
        channel: MediaChannel,
        muted: bool,
        muted_by: UserId,
        user_ids: Vec<UserId>,
    },
    PodStatsUpdated {
        pod_id: PodId,
        stats: PodStats,
    },
    PodOwnerChanged {
        pod_id: PodId,
        owner: UserId,
    },
}

impl PodEvent {
    /// Event name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            PodEvent::UserJoined { .. } => "user-joined",
            PodEvent::UserLeft { .. } => "user-left",
            PodEvent::PodTypeChanged { .. } => "pod-type-changed",
            PodEvent::ContentUpdated { .. } => "content-updated",
            PodEvent::CoHostApproved { .. } => "co-host-approved",
            PodEvent::JoinRequestApproved { .. } => "join-request-approved",
            PodEvent::AllJoinRequestsApproved { .. } => "all-join-requests-approved",
            PodEvent::UserAudioToggle { .. } => "user-audio-toggle",
            PodEvent::UserVideoToggle { .. } => "user-video-toggle",
            PodEvent::UserMuted { .. } => "user-muted",
            PodEvent::AllUsersMuted { .. } => "all-users-muted",
            PodEvent::PodStatsUpdated { .. } => "pod-stats-updated",
            PodEvent::PodOwnerChanged { .. } => "pod-owner-changed",
        }
    }
}

/// Direct response to the client that issued a command, or a private
/// notification to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Reply {
    PodCreated {
        pod: PodSnapshot,
    },
    /// Also sent privately to requesters admitted by a host.
    Joined {
        pod: PodSnapshot,
    },
    JoinRequested {
        pod_id: PodId,
    },
    Left {
        pod_id: PodId,
    },
    CoHostRequested {
        pod_id: PodId,
        /// False when the request was not recorded (already host, already
        /// pending, or not a member).
        pending: bool,
    },
    /// Result of a privileged or media command; `applied` is false for
    /// no-op outcomes.
    Ack {
        command: String,
        pod_id: PodId,
        applied: bool,
    },
    PodState {
        pod: PodSnapshot,
    },
    Error {
        code: i32,
        message: String,
    },
}

impl Reply {
    /// Client-facing error reply. Internal details stay in the logs.
    #[must_use]
    pub fn from_error(error: &PodError) -> Self {
        Reply::Error {
            code: error.error_code(),
            message: error.client_message(),
        }
    }

    #[must_use]
    pub fn ack(command: &str, pod_id: PodId, applied: bool) -> Self {
        Reply::Ack {
            command: command.to_string(),
            pod_id,
            applied,
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error { .. })
    }
}

/// Anything written to a client socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Event(PodEvent),
    Reply(Reply),
}

impl From<PodEvent> for ServerMessage {
    fn from(event: PodEvent) -> Self {
        ServerMessage::Event(event)
    }
}

impl From<Reply> for ServerMessage {
    fn from(reply: Reply) -> Self {
        ServerMessage::Reply(reply)
    }
}
