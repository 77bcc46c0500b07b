//! Inbound client commands.
//!
//! JSON text frames with a `type` tag in kebab-case and camelCase fields:
//!
//! ```json
//! {"type": "approve-join-request", "podId": "0011223344556677", "targetId": "0xabc"}
//! ```

use crate::errors::PodError;
use crate::pods::{AccessType, MediaChannel};
use common::types::{PodId, UserId};
use serde::Deserialize;

/// Largest accepted command frame. Checked before parsing.
pub const MAX_COMMAND_BYTES: usize = 16 * 1024;

/// A command from an authenticated client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum PodCommand {
    Create {
        #[serde(default)]
        content_reference: String,
    },
    Join {
        pod_id: PodId,
    },
    Leave {
        pod_id: PodId,
    },
    RequestCoHost {
        pod_id: PodId,
    },
    ApproveCoHost {
        pod_id: PodId,
        target_id: UserId,
    },
    ChangeAccessType {
        pod_id: PodId,
        access_type: AccessType,
    },
    ApproveJoinRequest {
        pod_id: PodId,
        target_id: UserId,
    },
    ApproveAllJoinRequests {
        pod_id: PodId,
    },
    UpdateMedia {
        pod_id: PodId,
        #[serde(default)]
        audio: Option<bool>,
        #[serde(default)]
        video: Option<bool>,
    },
    MuteMember {
        pod_id: PodId,
        target_id: UserId,
        channel: MediaChannel,
        muted: bool,
    },
    MuteAll {
        pod_id: PodId,
        channel: MediaChannel,
        muted: bool,
    },
    UpdateContent {
        pod_id: PodId,
        content_reference: String,
    },
    GetPod {
        pod_id: PodId,
    },
}

impl PodCommand {
    /// Parse a text frame.
    ///
    /// # Errors
    ///
    /// `InvalidCommand` if the frame is oversized or not a known command.
    pub fn parse(text: &str) -> Result<Self, PodError> {
        if text.len() > MAX_COMMAND_BYTES {
            return Err(PodError::InvalidCommand(format!(
                "frame of {} bytes exceeds limit",
                text.len()
            )));
        }
        serde_json::from_str(text).map_err(|e| PodError::InvalidCommand(e.to_string()))
    }

    /// Command name for metric labels and logs (bounded set).
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            PodCommand::Create { .. } => "create",
            PodCommand::Join { .. } => "join",
            PodCommand::Leave { .. } => "leave",
            PodCommand::RequestCoHost { .. } => "request-co-host",
            PodCommand::ApproveCoHost { .. } => "approve-co-host",
            PodCommand::ChangeAccessType { .. } => "change-access-type",
            PodCommand::ApproveJoinRequest { .. } => "approve-join-request",
            PodCommand::ApproveAllJoinRequests { .. } => "approve-all-join-requests",
            PodCommand::UpdateMedia { .. } => "update-media",
            PodCommand::MuteMember { .. } => "mute-member",
            PodCommand::MuteAll { .. } => "mute-all",
            PodCommand::UpdateContent { .. } => "update-content",
            PodCommand::GetPod { .. } => "get-pod",
        }
    }

    /// Target pod, if the command names one.
    #[must_use]
    pub fn pod_id(&self) -> Option<&PodId> {
        match self {
            PodCommand::Create { .. } => None,
            PodCommand::Join { pod_id }
            | PodCommand::Leave { pod_id }
            | PodCommand::RequestCoHost { pod_id }
            | PodCommand::ApproveCoHost { pod_id, .. }
            | PodCommand::ChangeAccessType { pod_id, .. }
            | PodCommand::ApproveJoinRequest { pod_id, .. }
            | PodCommand::ApproveAllJoinRequests { pod_id }
            | PodCommand::UpdateMedia { pod_id, .. }
            | PodCommand::MuteMember { pod_id, .. }
            | PodCommand::MuteAll { pod_id, .. }
            | PodCommand::UpdateContent { pod_id, .. }
            | PodCommand::GetPod { pod_id } => Some(pod_id),
        }
    }
}
