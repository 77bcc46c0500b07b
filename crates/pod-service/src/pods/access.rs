//! Access control predicates.
//!
//! Stateless functions of the pod record and its membership. `is_host`
//! treats the owner as a host even while absent; authorization goes through
//! [`role_of`], which only grants owner or host rights to present members.

use super::ledger::PodMembership;
use super::model::Pod;
use common::types::UserId;

/// Role of an identity relative to one pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Owner,
    Host,
    Member,
    PendingJoin,
    NonMember,
}

impl Role {
    /// Returns the role as a string for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Host => "host",
            Role::Member => "member",
            Role::PendingJoin => "pending_join",
            Role::NonMember => "non_member",
        }
    }

    /// Whether the role carries moderation privileges.
    #[must_use]
    pub const fn can_moderate(&self) -> bool {
        matches!(self, Role::Owner | Role::Host)
    }
}

#[must_use]
pub fn is_owner(pod: &Pod, user_id: &UserId) -> bool {
    &pod.owner == user_id
}

#[must_use]
pub fn is_host(pod: &Pod, user_id: &UserId) -> bool {
    is_owner(pod, user_id) || pod.hosts.contains(user_id)
}

#[must_use]
pub fn is_member(membership: &PodMembership, user_id: &UserId) -> bool {
    membership.is_member(user_id)
}

/// Classify an identity. Host privileges only count while the identity is
/// also present as a member.
#[must_use]
pub fn role_of(pod: &Pod, membership: &PodMembership, user_id: &UserId) -> Role {
    if membership.is_member(user_id) {
        if is_owner(pod, user_id) {
            Role::Owner
        } else if is_host(pod, user_id) {
            Role::Host
        } else {
            Role::Member
        }
    } else if membership.has_join_request(user_id) {
        Role::PendingJoin
    } else {
        Role::NonMember
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pods::model::{Caller, JoinRequest, Member};
    use common::types::{ConnectionId, PodId};

    fn setup() -> (Pod, PodMembership, UserId, UserId, UserId, UserId) {
        let alice = UserId::new("0xalice");
        let bob = UserId::new("0xbob");
        let carol = UserId::new("0xcarol");
        let dave = UserId::new("0xdave");

        let mut pod = Pod::new(PodId::from("aa"), alice.clone(), String::new());
        pod.hosts.push(bob.clone());

        let mut membership = PodMembership::new();
        for user in [&alice, &bob, &carol] {
            membership.insert_member(Member::from_caller(&Caller::new(
                user.clone(),
                ConnectionId::new(),
            )));
        }
        membership.insert_join_request(JoinRequest::from_caller(&Caller::new(
            dave.clone(),
            ConnectionId::new(),
        )));

        (pod, membership, alice, bob, carol, dave)
    }

    #[test]
    fn test_owner_counts_as_host() {
        let (mut pod, _, alice, _, _, _) = setup();
        pod.hosts.retain(|h| h != &alice);

        assert!(is_owner(&pod, &alice));
        assert!(is_host(&pod, &alice));
    }

    #[test]
    fn test_role_of() {
        let (pod, membership, alice, bob, carol, dave) = setup();

        assert_eq!(role_of(&pod, &membership, &alice), Role::Owner);
        assert_eq!(role_of(&pod, &membership, &bob), Role::Host);
        assert_eq!(role_of(&pod, &membership, &carol), Role::Member);
        assert_eq!(role_of(&pod, &membership, &dave), Role::PendingJoin);
        assert_eq!(
            role_of(&pod, &membership, &UserId::new("0xeve")),
            Role::NonMember
        );
    }

    #[test]
    fn test_can_moderate() {
        assert!(Role::Owner.can_moderate());
        assert!(Role::Host.can_moderate());
        assert!(!Role::Member.can_moderate());
        assert!(!Role::PendingJoin.can_moderate());
        assert!(!Role::NonMember.can_moderate());
    }

    #[test]
    fn test_is_member() {
        let (_, membership, _, _, carol, dave) = setup();
        assert!(is_member(&membership, &carol));
        assert!(!is_member(&membership, &dave));
    }
}
