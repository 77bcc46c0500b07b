//! Message types for shard actor communication.
//!
//! Every request carries a `oneshot` reply channel; the shard applies the
//! operation to its store and sends the outcome back before taking the next
//! message.

use crate::errors::PodError;
use crate::pods::{
    AccessChange, AccessType, Admission, Caller, JoinOutcome, LeaveOutcome, MediaChannel,
    MediaUpdate, Member, PodSnapshot,
};
use common::types::{ConnectionId, PodId, UserId};
use tokio::sync::oneshot;

/// Reply channel for a shard operation.
pub type Reply<T> = oneshot::Sender<Result<T, PodError>>;

/// Messages sent to a `PodShardActor`.
#[derive(Debug)]
pub enum ShardMessage {
    CreatePod {
        pod_id: PodId,
        caller: Caller,
        content_reference: String,
        respond_to: Reply<PodSnapshot>,
    },

    JoinPod {
        pod_id: PodId,
        caller: Caller,
        respond_to: Reply<JoinOutcome>,
    },

    /// Explicit leave.
    LeavePod {
        pod_id: PodId,
        user_id: UserId,
        respond_to: Reply<LeaveOutcome>,
    },

    /// Implicit leave when a connection closes.
    Disconnect {
        pod_id: PodId,
        user_id: UserId,
        connection_id: ConnectionId,
        respond_to: Reply<LeaveOutcome>,
    },

    RequestCoHost {
        pod_id: PodId,
        user_id: UserId,
        respond_to: Reply<Option<PodSnapshot>>,
    },

    ApproveCoHost {
        pod_id: PodId,
        approver: UserId,
        target: UserId,
        respond_to: Reply<Option<PodSnapshot>>,
    },

    ChangeAccessType {
        pod_id: PodId,
        caller: UserId,
        access_type: AccessType,
        respond_to: Reply<AccessChange>,
    },

    ApproveJoinRequest {
        pod_id: PodId,
        approver: UserId,
        target: UserId,
        respond_to: Reply<Option<Admission>>,
    },

    ApproveAllJoinRequests {
        pod_id: PodId,
        approver: UserId,
        respond_to: Reply<Admission>,
    },

    UpdateMemberMedia {
        pod_id: PodId,
        user_id: UserId,
        update: MediaUpdate,
        respond_to: Reply<Option<Member>>,
    },

    MuteMember {
        pod_id: PodId,
        authority: UserId,
        target: UserId,
        channel: MediaChannel,
        muted: bool,
        respond_to: Reply<Option<Member>>,
    },

    MuteAll {
        pod_id: PodId,
        authority: UserId,
        channel: MediaChannel,
        muted: bool,
        respond_to: Reply<Vec<Member>>,
    },

    UpdateContent {
        pod_id: PodId,
        caller: UserId,
        content_reference: String,
        respond_to: Reply<Option<PodSnapshot>>,
    },

    /// Consistent read of one pod.
    GetPod {
        pod_id: PodId,
        respond_to: Reply<PodSnapshot>,
    },

    GetMembers {
        pod_id: PodId,
        respond_to: Reply<Vec<Member>>,
    },

    /// Shard counters (for status and health reporting).
    GetStatus {
        respond_to: oneshot::Sender<ShardStatus>,
    },
}

impl ShardMessage {
    /// Short operation name for logs.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            ShardMessage::CreatePod { .. } => "create_pod",
            ShardMessage::JoinPod { .. } => "join_pod",
            ShardMessage::LeavePod { .. } => "leave_pod",
            ShardMessage::Disconnect { .. } => "disconnect",
            ShardMessage::RequestCoHost { .. } => "request_co_host",
            ShardMessage::ApproveCoHost { .. } => "approve_co_host",
            ShardMessage::ChangeAccessType { .. } => "change_access_type",
            ShardMessage::ApproveJoinRequest { .. } => "approve_join_request",
            ShardMessage::ApproveAllJoinRequests { .. } => "approve_all_join_requests",
            ShardMessage::UpdateMemberMedia { .. } => "update_member_media",
            ShardMessage::MuteMember { .. } => "mute_member",
            ShardMessage::MuteAll { .. } => "mute_all",
            ShardMessage::UpdateContent { .. } => "update_content",
            ShardMessage::GetPod { .. } => "get_pod",
            ShardMessage::GetMembers { .. } => "get_members",
            ShardMessage::GetStatus { .. } => "get_status",
        }
    }
}

/// Point-in-time counters for one shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardStatus {
    pub shard_index: usize,
    pub pod_count: usize,
    pub member_count: usize,
}

/// Aggregated status across all shards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerStatus {
    pub shard_count: usize,
    pub pod_count: usize,
    pub member_count: usize,
    pub is_draining: bool,
}
