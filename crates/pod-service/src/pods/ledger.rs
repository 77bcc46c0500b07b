//! Membership ledger: per-pod members, join requests and co-host requests.
//!
//! Collections are kept in arrival order. Every insert enforces the
//! per-identity uniqueness rules:
//!
//! - at most one entry per user in each collection
//! - a user is never both a member and a pending join requester
//! - a co-host request always refers to a current member

use super::model::{CoHostRequest, JoinRequest, Member};
use chrono::Utc;
use common::types::{PodId, UserId};
use std::collections::HashMap;

/// What was removed for a departing user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Removal {
    pub member: Option<Member>,
    pub join_request: Option<JoinRequest>,
    pub had_co_host_request: bool,
}

impl Removal {
    /// Whether anything was removed at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.member.is_none() && self.join_request.is_none() && !self.had_co_host_request
    }
}

/// Membership collections for a single pod.
#[derive(Debug, Clone, Default)]
pub struct PodMembership {
    members: Vec<Member>,
    join_requests: Vec<JoinRequest>,
    co_host_requests: Vec<CoHostRequest>,
}

impl PodMembership {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    #[must_use]
    pub fn join_requests(&self) -> &[JoinRequest] {
        &self.join_requests
    }

    #[must_use]
    pub fn co_host_requests(&self) -> &[CoHostRequest] {
        &self.co_host_requests
    }

    #[must_use]
    pub fn member(&self, user_id: &UserId) -> Option<&Member> {
        self.members.iter().find(|m| &m.user_id == user_id)
    }

    pub fn member_mut(&mut self, user_id: &UserId) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| &m.user_id == user_id)
    }

    pub fn members_mut(&mut self) -> impl Iterator<Item = &mut Member> {
        self.members.iter_mut()
    }

    #[must_use]
    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.member(user_id).is_some()
    }

    #[must_use]
    pub fn has_join_request(&self, user_id: &UserId) -> bool {
        self.join_requests.iter().any(|r| &r.user_id == user_id)
    }

    #[must_use]
    pub fn join_request(&self, user_id: &UserId) -> Option<&JoinRequest> {
        self.join_requests.iter().find(|r| &r.user_id == user_id)
    }

    #[must_use]
    pub fn has_co_host_request(&self, user_id: &UserId) -> bool {
        self.co_host_requests.iter().any(|r| &r.user_id == user_id)
    }

    /// Add a member. Returns `false` (leaving the existing record untouched)
    /// if the user is already a member. Any pending join request for the
    /// user is dropped.
    pub fn insert_member(&mut self, member: Member) -> bool {
        if self.is_member(&member.user_id) {
            return false;
        }
        self.join_requests.retain(|r| r.user_id != member.user_id);
        self.members.push(member);
        true
    }

    /// Queue a join request. Returns `false` if the user is already a member
    /// or already has a pending request.
    pub fn insert_join_request(&mut self, request: JoinRequest) -> bool {
        if self.is_member(&request.user_id) || self.has_join_request(&request.user_id) {
            return false;
        }
        self.join_requests.push(request);
        true
    }

    /// Remove and return a user's pending join request.
    pub fn take_join_request(&mut self, user_id: &UserId) -> Option<JoinRequest> {
        let index = self.join_requests.iter().position(|r| &r.user_id == user_id)?;
        Some(self.join_requests.remove(index))
    }

    /// Remove and return every pending join request, oldest first.
    pub fn drain_join_requests(&mut self) -> Vec<JoinRequest> {
        std::mem::take(&mut self.join_requests)
    }

    /// Queue a co-host request. Returns `false` if the user is not a member
    /// or already has a pending request. Host checks belong to the caller.
    pub fn insert_co_host_request(&mut self, user_id: &UserId) -> bool {
        if !self.is_member(user_id) || self.has_co_host_request(user_id) {
            return false;
        }
        self.co_host_requests.push(CoHostRequest {
            user_id: user_id.clone(),
            requested_at: Utc::now(),
        });
        true
    }

    /// Remove a user's co-host request. Returns whether one existed.
    pub fn remove_co_host_request(&mut self, user_id: &UserId) -> bool {
        let before = self.co_host_requests.len();
        self.co_host_requests.retain(|r| &r.user_id != user_id);
        self.co_host_requests.len() != before
    }

    /// Remove every trace of a user from this pod's collections.
    pub fn remove_user(&mut self, user_id: &UserId) -> Removal {
        let member = self
            .members
            .iter()
            .position(|m| &m.user_id == user_id)
            .map(|index| self.members.remove(index));
        let join_request = self.take_join_request(user_id);
        let had_co_host_request = self.remove_co_host_request(user_id);

        Removal {
            member,
            join_request,
            had_co_host_request,
        }
    }
}

/// Owned map of membership collections keyed by pod ID.
#[derive(Debug, Default)]
pub struct MembershipLedger {
    entries: HashMap<PodId, PodMembership>,
}

impl MembershipLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a pod with empty collections (replaces stale entries).
    pub fn open(&mut self, pod_id: PodId) -> &mut PodMembership {
        let entry = self.entries.entry(pod_id).or_default();
        *entry = PodMembership::new();
        entry
    }

    #[must_use]
    pub fn get(&self, pod_id: &PodId) -> Option<&PodMembership> {
        self.entries.get(pod_id)
    }

    pub fn get_mut(&mut self, pod_id: &PodId) -> Option<&mut PodMembership> {
        self.entries.get_mut(pod_id)
    }

    pub fn remove(&mut self, pod_id: &PodId) -> Option<PodMembership> {
        self.entries.remove(pod_id)
    }

    #[must_use]
    pub fn contains(&self, pod_id: &PodId) -> bool {
        self.entries.contains_key(pod_id)
    }

    /// Total members across all tracked pods.
    #[must_use]
    pub fn total_members(&self) -> usize {
        self.entries.values().map(|m| m.members.len()).sum()
    }
}
