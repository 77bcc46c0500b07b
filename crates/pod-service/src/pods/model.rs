//! Pod records and membership entries.

use chrono::{DateTime, Utc};
use common::types::{ConnectionId, PodId, UserId};
use serde::{Deserialize, Serialize};

/// Who may join a pod without approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    /// Anyone may join immediately.
    Open,
    /// Non-hosts are queued as join requests.
    Trusted,
}

impl AccessType {
    /// Returns the access type as a string for logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            AccessType::Open => "open",
            AccessType::Trusted => "trusted",
        }
    }
}

/// Media channel targeted by a mute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaChannel {
    Audio,
    Video,
}

/// Partial media state update from a member about themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<bool>,
}

/// Verified caller attached to every inbound command.
///
/// Built by the transport boundary after signature verification; profile
/// fields come from the connection handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub connection_id: ConnectionId,
    pub display_name: String,
    pub wallet_address: String,
    pub avatar_reference: Option<String>,
}

impl Caller {
    /// Caller whose display name and wallet address default to the user ID.
    #[must_use]
    pub fn new(user_id: UserId, connection_id: ConnectionId) -> Self {
        Self {
            display_name: user_id.to_string(),
            wallet_address: user_id.to_string(),
            user_id,
            connection_id,
            avatar_reference: None,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Set the avatar reference.
    #[must_use]
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar_reference = Some(avatar.into());
        self
    }
}

/// A live participant of a pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub user_id: UserId,
    pub connection_id: ConnectionId,
    pub display_name: String,
    pub wallet_address: String,
    pub avatar_reference: Option<String>,
    pub is_audio_enabled: bool,
    pub is_video_enabled: bool,
}

impl Member {
    /// New member with media enabled.
    #[must_use]
    pub fn from_caller(caller: &Caller) -> Self {
        Self {
            user_id: caller.user_id.clone(),
            connection_id: caller.connection_id,
            display_name: caller.display_name.clone(),
            wallet_address: caller.wallet_address.clone(),
            avatar_reference: caller.avatar_reference.clone(),
            is_audio_enabled: true,
            is_video_enabled: true,
        }
    }

    /// Set one channel's enabled flag.
    pub fn set_channel(&mut self, channel: MediaChannel, enabled: bool) {
        match channel {
            MediaChannel::Audio => self.is_audio_enabled = enabled,
            MediaChannel::Video => self.is_video_enabled = enabled,
        }
    }
}

/// A queued join attempt against a trusted pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub user_id: UserId,
    pub connection_id: ConnectionId,
    pub display_name: String,
    pub wallet_address: String,
    pub avatar_reference: Option<String>,
    pub requested_at: DateTime<Utc>,
}

impl JoinRequest {
    #[must_use]
    pub fn from_caller(caller: &Caller) -> Self {
        Self {
            user_id: caller.user_id.clone(),
            connection_id: caller.connection_id,
            display_name: caller.display_name.clone(),
            wallet_address: caller.wallet_address.clone(),
            avatar_reference: caller.avatar_reference.clone(),
            requested_at: Utc::now(),
        }
    }

    /// Promote the request into a member record (media enabled).
    #[must_use]
    pub fn into_member(self) -> Member {
        Member {
            user_id: self.user_id,
            connection_id: self.connection_id,
            display_name: self.display_name,
            wallet_address: self.wallet_address,
            avatar_reference: self.avatar_reference,
            is_audio_enabled: true,
            is_video_enabled: true,
        }
    }
}

/// A member's pending request to become a host.
///
/// Refers to the existing member record by user ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoHostRequest {
    pub user_id: UserId,
    pub requested_at: DateTime<Utc>,
}

/// Session record owned by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    pub id: PodId,
    pub owner: UserId,
    /// Hosts in promotion order; the creator is first.
    pub hosts: Vec<UserId>,
    pub access_type: AccessType,
    pub content_reference: String,
    pub created_at: DateTime<Utc>,
}

impl Pod {
    /// New open pod owned and hosted by `owner`.
    #[must_use]
    pub fn new(id: PodId, owner: UserId, content_reference: String) -> Self {
        Self {
            id,
            hosts: vec![owner.clone()],
            owner,
            access_type: AccessType::Open,
            content_reference,
            created_at: Utc::now(),
        }
    }
}

/// Counts derived from the authoritative collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStats {
    pub member_count: usize,
    pub host_count: usize,
    pub join_request_count: usize,
    pub co_host_request_count: usize,
}

/// Consistent point-in-time view of one pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSnapshot {
    pub pod: Pod,
    pub stats: PodStats,
    pub members: Vec<Member>,
    pub join_requests: Vec<JoinRequest>,
    pub co_host_requests: Vec<CoHostRequest>,
}

impl PodSnapshot {
    /// Find a member by user ID.
    #[must_use]
    pub fn member(&self, user_id: &UserId) -> Option<&Member> {
        self.members.iter().find(|m| &m.user_id == user_id)
    }

    /// Member user IDs in join order.
    #[must_use]
    pub fn member_ids(&self) -> Vec<UserId> {
        self.members.iter().map(|m| m.user_id.clone()).collect()
    }
}
