//! Pod lifecycle operations over an owned [`PodStore`].
//!
//! Every operation applies completely or not at all, and returns a
//! structured outcome carrying the post-operation snapshot the signaling
//! layer needs for broadcasts. Expected user-triggerable conditions
//! (double approval, stale requests, leaving twice) are reported as no-op
//! outcomes (`None`, empty lists); only a missing pod, a missing role, or a
//! capacity limit is an error.
//!
//! Owner succession: hosts are kept in promotion order, so when the owner
//! leaves, the earliest-promoted remaining host becomes owner. An owner who
//! leaves with no host to succeed them keeps the title but no authority:
//! privileged operations require the caller to be a present member.

use super::access::{is_host, is_owner, role_of, Role};
use super::ledger::{MembershipLedger, PodMembership, Removal};
use super::model::{
    AccessType, Caller, JoinRequest, MediaChannel, MediaUpdate, Member, Pod, PodSnapshot,
    PodStats,
};
use crate::errors::PodError;
use common::types::{ConnectionId, PodId, UserId};
use tracing::{debug, info, warn};

/// Default per-pod member limit.
pub const DEFAULT_MAX_MEMBERS_PER_POD: usize = 500;

/// Result of a join attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Caller is a member (`newly_joined` is false for a repeated join).
    Joined {
        member: Member,
        newly_joined: bool,
        snapshot: PodSnapshot,
    },
    /// Caller is queued for approval (`newly_requested` is false when an
    /// existing request was reused).
    Requested {
        request: JoinRequest,
        newly_requested: bool,
        snapshot: PodSnapshot,
    },
}

/// Details of a departure from a pod that is still live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub user_id: UserId,
    pub removal: Removal,
    pub was_host: bool,
    /// Set when ownership passed to another host.
    pub new_owner: Option<UserId>,
    pub snapshot: PodSnapshot,
}

/// Result of a leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Pod remains live. `removal` is empty if the user was not present.
    Departed(Departure),
    /// The last member left; the pod and all pending requests are gone.
    TornDown {
        pod_id: PodId,
        user_id: UserId,
        removal: Removal,
    },
}

/// Members admitted from the join-request queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub admitted: Vec<Member>,
    pub snapshot: PodSnapshot,
}

/// Result of an access type change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessChange {
    pub previous: AccessType,
    pub admitted: Vec<Member>,
    pub snapshot: PodSnapshot,
}

/// Registry and ledger for a set of pods, mutated only through the
/// lifecycle operations below.
#[derive(Debug)]
pub struct PodStore {
    registry: super::registry::SessionRegistry,
    ledger: MembershipLedger,
    max_members_per_pod: usize,
}

impl Default for PodStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MEMBERS_PER_POD)
    }
}

/// Build a consistent snapshot. Stats are always derived here.
fn snapshot_of(pod: &Pod, membership: &PodMembership) -> PodSnapshot {
    PodSnapshot {
        pod: pod.clone(),
        stats: PodStats {
            member_count: membership.members().len(),
            host_count: pod.hosts.len(),
            join_request_count: membership.join_requests().len(),
            co_host_request_count: membership.co_host_requests().len(),
        },
        members: membership.members().to_vec(),
        join_requests: membership.join_requests().to_vec(),
        co_host_requests: membership.co_host_requests().to_vec(),
    }
}

fn not_found(pod_id: &PodId) -> PodError {
    PodError::PodNotFound(pod_id.to_string())
}

/// Require a present owner or host, logging the caller's actual role.
fn require_moderator(
    pod: &Pod,
    membership: &PodMembership,
    user_id: &UserId,
    action: &'static str,
    denial: &str,
) -> Result<(), PodError> {
    let role = role_of(pod, membership, user_id);
    if role.can_moderate() {
        return Ok(());
    }
    warn!(
        target: "pod.lifecycle",
        pod_id = %pod.id,
        role = role.as_str(),
        action = action,
        "Privileged operation refused"
    );
    Err(PodError::PermissionDenied(denial.to_string()))
}

impl PodStore {
    #[must_use]
    pub fn new(max_members_per_pod: usize) -> Self {
        Self {
            registry: super::registry::SessionRegistry::new(),
            ledger: MembershipLedger::new(),
            max_members_per_pod,
        }
    }

    /// Number of live pods.
    #[must_use]
    pub fn pod_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of members across all live pods.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.ledger.total_members()
    }

    #[must_use]
    pub fn contains(&self, pod_id: &PodId) -> bool {
        self.registry.contains(pod_id)
    }

    /// Look up the pod record and its membership together.
    fn entry(&self, pod_id: &PodId) -> Result<(&Pod, &PodMembership), PodError> {
        let pod = self.registry.get(pod_id).ok_or_else(|| not_found(pod_id))?;
        let membership = self.ledger.get(pod_id).ok_or_else(|| {
            warn!(target: "pod.lifecycle", pod_id = %pod_id, "Registry entry without ledger entry");
            PodError::Internal("ledger entry missing".to_string())
        })?;
        Ok((pod, membership))
    }

    fn entry_mut(&mut self, pod_id: &PodId) -> Result<(&mut Pod, &mut PodMembership), PodError> {
        let pod = self
            .registry
            .get_mut(pod_id)
            .ok_or_else(|| not_found(pod_id))?;
        let membership = self.ledger.get_mut(pod_id).ok_or_else(|| {
            warn!(target: "pod.lifecycle", pod_id = %pod_id, "Registry entry without ledger entry");
            PodError::Internal("ledger entry missing".to_string())
        })?;
        Ok((pod, membership))
    }

    /// Current snapshot of a pod.
    ///
    /// # Errors
    ///
    /// `PodNotFound` if the pod does not exist.
    pub fn snapshot(&self, pod_id: &PodId) -> Result<PodSnapshot, PodError> {
        let (pod, membership) = self.entry(pod_id)?;
        Ok(snapshot_of(pod, membership))
    }

    /// Current members of a pod, in join order.
    ///
    /// # Errors
    ///
    /// `PodNotFound` if the pod does not exist.
    pub fn members(&self, pod_id: &PodId) -> Result<Vec<Member>, PodError> {
        let (_, membership) = self.entry(pod_id)?;
        Ok(membership.members().to_vec())
    }

    /// Create an open pod with the caller as owner, sole host and sole member.
    ///
    /// # Errors
    ///
    /// `Conflict` if `pod_id` is already live; the caller should retry with
    /// a fresh ID.
    pub fn create_pod(
        &mut self,
        pod_id: PodId,
        caller: &Caller,
        content_reference: String,
    ) -> Result<PodSnapshot, PodError> {
        let pod = Pod::new(pod_id.clone(), caller.user_id.clone(), content_reference);
        self.registry
            .insert(pod)
            .map_err(|_| PodError::Conflict("Pod ID already in use".to_string()))?;

        let membership = self.ledger.open(pod_id.clone());
        membership.insert_member(Member::from_caller(caller));

        info!(target: "pod.lifecycle", pod_id = %pod_id, "Pod created");
        self.snapshot(&pod_id)
    }

    /// Join a pod, or queue a join request for a trusted pod.
    ///
    /// # Errors
    ///
    /// `PodNotFound` if the pod does not exist; `CapacityExceeded` if a new
    /// member would exceed the per-pod limit.
    pub fn join_pod(&mut self, pod_id: &PodId, caller: &Caller) -> Result<JoinOutcome, PodError> {
        let max_members = self.max_members_per_pod;
        let (pod, membership) = self.entry_mut(pod_id)?;
        let user_id = &caller.user_id;

        if let Some(existing) = membership.member(user_id) {
            let member = existing.clone();
            return Ok(JoinOutcome::Joined {
                member,
                newly_joined: false,
                snapshot: snapshot_of(pod, membership),
            });
        }

        if pod.access_type == AccessType::Open || is_host(pod, user_id) {
            if membership.members().len() >= max_members {
                return Err(PodError::CapacityExceeded("Pod is full".to_string()));
            }

            // A returning owner reclaims its host seat.
            if is_owner(pod, user_id) && !pod.hosts.contains(user_id) {
                pod.hosts.insert(0, user_id.clone());
            }

            let member = Member::from_caller(caller);
            membership.insert_member(member.clone());
            debug!(target: "pod.lifecycle", pod_id = %pod_id, "Member joined");

            return Ok(JoinOutcome::Joined {
                member,
                newly_joined: true,
                snapshot: snapshot_of(pod, membership),
            });
        }

        if let Some(existing) = membership.join_request(user_id) {
            let request = existing.clone();
            return Ok(JoinOutcome::Requested {
                request,
                newly_requested: false,
                snapshot: snapshot_of(pod, membership),
            });
        }

        let request = JoinRequest::from_caller(caller);
        membership.insert_join_request(request.clone());
        debug!(target: "pod.lifecycle", pod_id = %pod_id, "Join request queued");

        Ok(JoinOutcome::Requested {
            request,
            newly_requested: true,
            snapshot: snapshot_of(pod, membership),
        })
    }

    /// Remove a user from every collection of a pod, handing over ownership
    /// or tearing the pod down as needed.
    ///
    /// # Errors
    ///
    /// `PodNotFound` if the pod does not exist.
    pub fn leave_pod(&mut self, pod_id: &PodId, user_id: &UserId) -> Result<LeaveOutcome, PodError> {
        let (pod, membership) = self.entry_mut(pod_id)?;

        let removal = membership.remove_user(user_id);
        let was_host = pod.hosts.contains(user_id);
        pod.hosts.retain(|h| h != user_id);

        if membership.members().is_empty() {
            self.registry.remove(pod_id);
            self.ledger.remove(pod_id);
            info!(target: "pod.lifecycle", pod_id = %pod_id, "Last member left, pod torn down");
            return Ok(LeaveOutcome::TornDown {
                pod_id: pod_id.clone(),
                user_id: user_id.clone(),
                removal,
            });
        }

        let mut new_owner = None;
        if &pod.owner == user_id {
            if let Some(successor) = pod.hosts.first() {
                pod.owner = successor.clone();
                new_owner = Some(successor.clone());
                info!(target: "pod.lifecycle", pod_id = %pod_id, "Ownership transferred");
            }
        }

        Ok(LeaveOutcome::Departed(Departure {
            user_id: user_id.clone(),
            removal,
            was_host,
            new_owner,
            snapshot: snapshot_of(pod, membership),
        }))
    }

    /// Leave on behalf of a closing connection. A member record or join
    /// request created by another connection of the same user is left in
    /// place and the outcome is an empty departure.
    ///
    /// # Errors
    ///
    /// `PodNotFound` if the pod does not exist.
    pub fn disconnect(
        &mut self,
        pod_id: &PodId,
        user_id: &UserId,
        connection_id: ConnectionId,
    ) -> Result<LeaveOutcome, PodError> {
        let (pod, membership) = self.entry(pod_id)?;

        let holder = membership
            .member(user_id)
            .map(|m| m.connection_id)
            .or_else(|| membership.join_request(user_id).map(|r| r.connection_id));
        if holder.is_some_and(|held_by| held_by != connection_id) {
            debug!(target: "pod.lifecycle", pod_id = %pod_id, "Record held by another connection, keeping it");
            return Ok(LeaveOutcome::Departed(Departure {
                user_id: user_id.clone(),
                removal: Removal::default(),
                was_host: false,
                new_owner: None,
                snapshot: snapshot_of(pod, membership),
            }));
        }

        self.leave_pod(pod_id, user_id)
    }

    /// Ask to be promoted to host. `None` when the caller is not a member,
    /// is already a host, or already has a pending request.
    ///
    /// # Errors
    ///
    /// `PodNotFound` if the pod does not exist.
    pub fn request_co_host(
        &mut self,
        pod_id: &PodId,
        user_id: &UserId,
    ) -> Result<Option<PodSnapshot>, PodError> {
        let (pod, membership) = self.entry_mut(pod_id)?;

        if is_host(pod, user_id) || !membership.insert_co_host_request(user_id) {
            return Ok(None);
        }
        Ok(Some(snapshot_of(pod, membership)))
    }

    /// Promote a member with a pending co-host request. `None` when no such
    /// request exists.
    ///
    /// # Errors
    ///
    /// `PodNotFound`; `PermissionDenied` if the approver is not a present
    /// host.
    pub fn approve_co_host(
        &mut self,
        pod_id: &PodId,
        approver: &UserId,
        target: &UserId,
    ) -> Result<Option<PodSnapshot>, PodError> {
        let (pod, membership) = self.entry_mut(pod_id)?;

        require_moderator(
            pod,
            membership,
            approver,
            "approve_co_host",
            "Only hosts can approve co-hosts",
        )?;

        if !membership.remove_co_host_request(target) {
            return Ok(None);
        }
        if !pod.hosts.contains(target) {
            pod.hosts.push(target.clone());
        }
        Ok(Some(snapshot_of(pod, membership)))
    }

    /// Change the access type. Opening a pod admits the whole pending queue.
    ///
    /// # Errors
    ///
    /// `PodNotFound`; `PermissionDenied` if the caller is not the present
    /// owner; `CapacityExceeded` when opening would take the pod past its
    /// member limit, in which case nothing changes.
    pub fn change_access_type(
        &mut self,
        pod_id: &PodId,
        caller: &UserId,
        access_type: AccessType,
    ) -> Result<AccessChange, PodError> {
        let max_members = self.max_members_per_pod;
        let (pod, membership) = self.entry_mut(pod_id)?;

        let role = role_of(pod, membership, caller);
        if role != Role::Owner {
            warn!(
                target: "pod.lifecycle",
                pod_id = %pod_id,
                role = role.as_str(),
                "Non-owner attempted access type change"
            );
            return Err(PodError::PermissionDenied(
                "Only the owner can change the pod type".to_string(),
            ));
        }

        let queued = membership.join_requests().len();
        if access_type == AccessType::Open && membership.members().len() + queued > max_members {
            warn!(
                target: "pod.lifecycle",
                pod_id = %pod_id,
                queued = queued,
                "Opening pod would exceed member limit"
            );
            return Err(PodError::CapacityExceeded(
                "Pod cannot admit every pending request".to_string(),
            ));
        }

        let previous = pod.access_type;
        pod.access_type = access_type;

        let admitted = if access_type == AccessType::Open {
            admit_pending(membership, max_members)
        } else {
            Vec::new()
        };

        info!(
            target: "pod.lifecycle",
            pod_id = %pod_id,
            access_type = access_type.as_str(),
            admitted = admitted.len(),
            "Access type changed"
        );

        Ok(AccessChange {
            previous,
            admitted,
            snapshot: snapshot_of(pod, membership),
        })
    }

    /// Admit one pending join request. `None` when the target has no
    /// pending request.
    ///
    /// # Errors
    ///
    /// `PodNotFound`; `PermissionDenied` if the approver is not a present
    /// host; `CapacityExceeded` if the pod is full.
    pub fn approve_join_request(
        &mut self,
        pod_id: &PodId,
        approver: &UserId,
        target: &UserId,
    ) -> Result<Option<Admission>, PodError> {
        let max_members = self.max_members_per_pod;
        let (pod, membership) = self.entry_mut(pod_id)?;

        require_moderator(
            pod,
            membership,
            approver,
            "approve_join_request",
            "Only hosts can approve join requests",
        )?;

        if !membership.has_join_request(target) {
            return Ok(None);
        }
        if membership.members().len() >= max_members {
            return Err(PodError::CapacityExceeded("Pod is full".to_string()));
        }

        let Some(request) = membership.take_join_request(target) else {
            return Ok(None);
        };
        let member = request.into_member();
        membership.insert_member(member.clone());

        Ok(Some(Admission {
            admitted: vec![member],
            snapshot: snapshot_of(pod, membership),
        }))
    }

    /// Admit every pending join request (up to the member limit).
    ///
    /// # Errors
    ///
    /// `PodNotFound`; `PermissionDenied` if the approver is not a present
    /// host.
    pub fn approve_all_join_requests(
        &mut self,
        pod_id: &PodId,
        approver: &UserId,
    ) -> Result<Admission, PodError> {
        let max_members = self.max_members_per_pod;
        let (pod, membership) = self.entry_mut(pod_id)?;

        require_moderator(
            pod,
            membership,
            approver,
            "approve_all_join_requests",
            "Only hosts can approve join requests",
        )?;

        let admitted = admit_pending(membership, max_members);
        Ok(Admission {
            admitted,
            snapshot: snapshot_of(pod, membership),
        })
    }

    /// Update the caller's own media flags. `None` when the caller is not a
    /// member.
    ///
    /// # Errors
    ///
    /// `PodNotFound` if the pod does not exist.
    pub fn update_member_media(
        &mut self,
        pod_id: &PodId,
        user_id: &UserId,
        update: MediaUpdate,
    ) -> Result<Option<Member>, PodError> {
        let (_, membership) = self.entry_mut(pod_id)?;

        let Some(member) = membership.member_mut(user_id) else {
            return Ok(None);
        };
        if let Some(audio) = update.audio {
            member.is_audio_enabled = audio;
        }
        if let Some(video) = update.video {
            member.is_video_enabled = video;
        }
        Ok(Some(member.clone()))
    }

    /// Force one member's channel on or off. `None` when the target is not
    /// a member.
    ///
    /// # Errors
    ///
    /// `PodNotFound`; `PermissionDenied` if the authority is not a host.
    pub fn mute_member(
        &mut self,
        pod_id: &PodId,
        authority: &UserId,
        target: &UserId,
        channel: MediaChannel,
        muted: bool,
    ) -> Result<Option<Member>, PodError> {
        let (pod, membership) = self.entry_mut(pod_id)?;

        require_moderator(
            pod,
            membership,
            authority,
            "mute_member",
            "Only hosts can mute other members",
        )?;

        let Some(member) = membership.member_mut(target) else {
            return Ok(None);
        };
        member.set_channel(channel, !muted);
        Ok(Some(member.clone()))
    }

    /// Force a channel on or off for every member except the authority.
    /// Returns the affected members.
    ///
    /// # Errors
    ///
    /// `PodNotFound`; `PermissionDenied` if the authority is not a host.
    pub fn mute_all(
        &mut self,
        pod_id: &PodId,
        authority: &UserId,
        channel: MediaChannel,
        muted: bool,
    ) -> Result<Vec<Member>, PodError> {
        let (pod, membership) = self.entry_mut(pod_id)?;

        require_moderator(
            pod,
            membership,
            authority,
            "mute_all",
            "Only hosts can mute other members",
        )?;

        let affected = membership
            .members_mut()
            .filter(|m| &m.user_id != authority)
            .map(|m| {
                m.set_channel(channel, !muted);
                m.clone()
            })
            .collect();
        Ok(affected)
    }

    /// Replace the content reference. `None` when it is unchanged.
    ///
    /// # Errors
    ///
    /// `PodNotFound`; `PermissionDenied` if the caller is not a host.
    pub fn update_content(
        &mut self,
        pod_id: &PodId,
        caller: &UserId,
        content_reference: String,
    ) -> Result<Option<PodSnapshot>, PodError> {
        let (pod, membership) = self.entry_mut(pod_id)?;

        require_moderator(
            pod,
            membership,
            caller,
            "update_content",
            "Only hosts can update content",
        )?;
        if pod.content_reference == content_reference {
            return Ok(None);
        }
        pod.content_reference = content_reference;
        Ok(Some(snapshot_of(pod, membership)))
    }
}

/// Move pending join requests into members, oldest first, until the pod is
/// full. Requests that do not fit stay queued.
///
/// Bulk approval relies on the partial admission; opening a pod checks up
/// front that the whole queue fits.
fn admit_pending(membership: &mut PodMembership, max_members: usize) -> Vec<Member> {
    let room = max_members.saturating_sub(membership.members().len());
    let mut pending = membership.drain_join_requests();
    let overflow = if pending.len() > room {
        pending.split_off(room)
    } else {
        Vec::new()
    };

    let mut admitted = Vec::with_capacity(pending.len());
    for request in pending {
        let member = request.into_member();
        if membership.insert_member(member.clone()) {
            admitted.push(member);
        }
    }
    for request in overflow {
        membership.insert_join_request(request);
    }
    admitted
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use common::types::ConnectionId;

    fn caller(name: &str) -> Caller {
        Caller::new(UserId::new(name), ConnectionId::new())
    }

    fn pod_with(store: &mut PodStore, owner: &Caller) -> PodId {
        let pod_id = PodId::from("0011223344556677");
        store
            .create_pod(pod_id.clone(), owner, "ipfs://x".to_string())
            .unwrap();
        pod_id
    }

    /// Invariants that must hold after every operation.
    fn assert_invariants(store: &PodStore, pod_id: &PodId) {
        let Ok(snapshot) = store.snapshot(pod_id) else {
            return;
        };
        assert_eq!(snapshot.stats.member_count, snapshot.members.len());
        assert_eq!(snapshot.stats.host_count, snapshot.pod.hosts.len());
        assert_eq!(snapshot.stats.join_request_count, snapshot.join_requests.len());
        assert_eq!(
            snapshot.stats.co_host_request_count,
            snapshot.co_host_requests.len()
        );
        if !snapshot.pod.hosts.is_empty() {
            assert!(snapshot.pod.hosts.contains(&snapshot.pod.owner));
        }
        for request in &snapshot.join_requests {
            assert!(snapshot.member(&request.user_id).is_none());
        }
        for request in &snapshot.co_host_requests {
            assert!(snapshot.member(&request.user_id).is_some());
            assert!(!snapshot.pod.hosts.contains(&request.user_id));
        }
    }

    #[test]
    fn test_create_pod() {
        let mut store = PodStore::default();
        let alice = caller("0xalice");
        let pod_id = pod_with(&mut store, &alice);

        let snapshot = store.snapshot(&pod_id).unwrap();
        assert_eq!(snapshot.pod.owner, alice.user_id);
        assert_eq!(snapshot.pod.hosts, vec![alice.user_id.clone()]);
        assert_eq!(snapshot.pod.access_type, AccessType::Open);
        assert_eq!(snapshot.member_ids(), vec![alice.user_id.clone()]);
        assert_invariants(&store, &pod_id);
    }

    #[test]
    fn test_create_pod_id_collision() {
        let mut store = PodStore::default();
        let alice = caller("0xalice");
        let pod_id = pod_with(&mut store, &alice);

        let result = store.create_pod(pod_id, &caller("0xbob"), String::new());
        assert!(matches!(result, Err(PodError::Conflict(_))));
        assert_eq!(store.pod_count(), 1);
    }

    #[test]
    fn test_join_unknown_pod() {
        let mut store = PodStore::default();
        let result = store.join_pod(&PodId::from("nope"), &caller("0xbob"));
        assert!(matches!(result, Err(PodError::PodNotFound(_))));
    }

    #[test]
    fn test_join_open_pod_is_idempotent() {
        let mut store = PodStore::default();
        let alice = caller("0xalice");
        let bob = caller("0xbob");
        let pod_id = pod_with(&mut store, &alice);

        let first = store.join_pod(&pod_id, &bob).unwrap();
        assert!(matches!(first, JoinOutcome::Joined { newly_joined: true, .. }));

        let second = store.join_pod(&pod_id, &bob).unwrap();
        match second {
            JoinOutcome::Joined {
                newly_joined,
                snapshot,
                ..
            } => {
                assert!(!newly_joined);
                assert_eq!(snapshot.stats.member_count, 2);
            }
            other => panic!("expected Joined, got {other:?}"),
        }
        assert_invariants(&store, &pod_id);
    }

    #[test]
    fn test_trusted_pod_queues_non_hosts_once() {
        let mut store = PodStore::default();
        let alice = caller("0xalice");
        let carol = caller("0xcarol");
        let pod_id = pod_with(&mut store, &alice);
        store
            .change_access_type(&pod_id, &alice.user_id, AccessType::Trusted)
            .unwrap();

        let first = store.join_pod(&pod_id, &carol).unwrap();
        assert!(matches!(
            first,
            JoinOutcome::Requested { newly_requested: true, .. }
        ));
        let second = store.join_pod(&pod_id, &carol).unwrap();
        assert!(matches!(
            second,
            JoinOutcome::Requested { newly_requested: false, .. }
        ));

        let snapshot = store.snapshot(&pod_id).unwrap();
        assert_eq!(snapshot.join_requests.len(), 1);
        assert_eq!(snapshot.members.len(), 1);
        assert_invariants(&store, &pod_id);
    }

    #[test]
    fn test_owner_bypasses_trusted_queue() {
        let mut store = PodStore::default();
        let alice = caller("0xalice");
        let bob = caller("0xbob");
        let pod_id = pod_with(&mut store, &alice);

        store.join_pod(&pod_id, &bob).unwrap();
        store
            .change_access_type(&pod_id, &alice.user_id, AccessType::Trusted)
            .unwrap();
        store.leave_pod(&pod_id, &alice.user_id).unwrap();

        let outcome = store.join_pod(&pod_id, &alice).unwrap();
        assert!(matches!(outcome, JoinOutcome::Joined { newly_joined: true, .. }));
        assert!(store.snapshot(&pod_id).unwrap().join_requests.is_empty());
        assert_invariants(&store, &pod_id);
    }

    #[test]
    fn test_non_host_cannot_approve_join_request() {
        let mut store = PodStore::default();
        let alice = caller("0xalice");
        let bob = caller("0xbob");
        let carol = caller("0xcarol");
        let pod_id = pod_with(&mut store, &alice);

        store.join_pod(&pod_id, &bob).unwrap();
        store
            .change_access_type(&pod_id, &alice.user_id, AccessType::Trusted)
            .unwrap();
        store.join_pod(&pod_id, &carol).unwrap();

        let result = store.approve_join_request(&pod_id, &bob.user_id, &carol.user_id);
        assert!(matches!(result, Err(PodError::PermissionDenied(_))));

        let all = store.approve_all_join_requests(&pod_id, &bob.user_id);
        assert!(matches!(all, Err(PodError::PermissionDenied(_))));

        let snapshot = store.snapshot(&pod_id).unwrap();
        assert_eq!(snapshot.join_requests.len(), 1);
        assert!(snapshot.member(&carol.user_id).is_none());
    }

    #[test]
    fn test_approve_join_request_twice_is_noop() {
        let mut store = PodStore::default();
        let alice = caller("0xalice");
        let carol = caller("0xcarol");
        let pod_id = pod_with(&mut store, &alice);
        store
            .change_access_type(&pod_id, &alice.user_id, AccessType::Trusted)
            .unwrap();
        store.join_pod(&pod_id, &carol).unwrap();

        let first = store
            .approve_join_request(&pod_id, &alice.user_id, &carol.user_id)
            .unwrap();
        assert_eq!(first.unwrap().admitted.len(), 1);

        let second = store
            .approve_join_request(&pod_id, &alice.user_id, &carol.user_id)
            .unwrap();
        assert!(second.is_none());
        assert_invariants(&store, &pod_id);
    }

    #[test]
    fn test_opening_pod_admits_queue() {
        let mut store = PodStore::default();
        let alice = caller("0xalice");
        let pod_id = pod_with(&mut store, &alice);
        store
            .change_access_type(&pod_id, &alice.user_id, AccessType::Trusted)
            .unwrap();
        for name in ["0xc", "0xd", "0xe"] {
            store.join_pod(&pod_id, &caller(name)).unwrap();
        }

        let change = store
            .change_access_type(&pod_id, &alice.user_id, AccessType::Open)
            .unwrap();
        assert_eq!(change.previous, AccessType::Trusted);
        assert_eq!(change.admitted.len(), 3);
        assert!(change.snapshot.join_requests.is_empty());
        assert_eq!(change.snapshot.stats.member_count, 4);
        assert_invariants(&store, &pod_id);
    }

    #[test]
    fn test_only_owner_changes_access_type() {
        let mut store = PodStore::default();
        let alice = caller("0xalice");
        let bob = caller("0xbob");
        let pod_id = pod_with(&mut store, &alice);
        store.join_pod(&pod_id, &bob).unwrap();
        store.request_co_host(&pod_id, &bob.user_id).unwrap();
        store
            .approve_co_host(&pod_id, &alice.user_id, &bob.user_id)
            .unwrap();

        // Hosts are not enough
        let result = store.change_access_type(&pod_id, &bob.user_id, AccessType::Trusted);
        assert!(matches!(result, Err(PodError::PermissionDenied(_))));
        assert_eq!(
            store.snapshot(&pod_id).unwrap().pod.access_type,
            AccessType::Open
        );
    }

    #[test]
    fn test_admission_respects_member_limit() {
        let mut store = PodStore::new(2);
        let alice = caller("0xalice");
        let pod_id = pod_with(&mut store, &alice);
        store
            .change_access_type(&pod_id, &alice.user_id, AccessType::Trusted)
            .unwrap();
        store.join_pod(&pod_id, &caller("0xc")).unwrap();
        store.join_pod(&pod_id, &caller("0xd")).unwrap();

        let admission = store
            .approve_all_join_requests(&pod_id, &alice.user_id)
            .unwrap();
        assert_eq!(admission.admitted.len(), 1);
        assert_eq!(admission.admitted.first().unwrap().user_id, UserId::new("0xc"));
        assert_eq!(admission.snapshot.join_requests.len(), 1);

        let result = store.approve_join_request(&pod_id, &alice.user_id, &UserId::new("0xd"));
        assert!(matches!(result, Err(PodError::CapacityExceeded(_))));
        assert_invariants(&store, &pod_id);
    }

    #[test]
    fn test_co_host_request_rules() {
        let mut store = PodStore::default();
        let alice = caller("0xalice");
        let bob = caller("0xbob");
        let pod_id = pod_with(&mut store, &alice);

        // Non-member
        assert!(store.request_co_host(&pod_id, &bob.user_id).unwrap().is_none());
        // Host
        assert!(store
            .request_co_host(&pod_id, &alice.user_id)
            .unwrap()
            .is_none());

        store.join_pod(&pod_id, &bob).unwrap();
        assert!(store.request_co_host(&pod_id, &bob.user_id).unwrap().is_some());
        // Duplicate
        assert!(store.request_co_host(&pod_id, &bob.user_id).unwrap().is_none());
        assert_invariants(&store, &pod_id);
    }

    #[test]
    fn test_approve_co_host_without_request_is_noop() {
        let mut store = PodStore::default();
        let alice = caller("0xalice");
        let bob = caller("0xbob");
        let pod_id = pod_with(&mut store, &alice);
        store.join_pod(&pod_id, &bob).unwrap();

        let result = store
            .approve_co_host(&pod_id, &alice.user_id, &bob.user_id)
            .unwrap();
        assert!(result.is_none());
        assert_eq!(store.snapshot(&pod_id).unwrap().pod.hosts.len(), 1);
    }

    #[test]
    fn test_owner_leaving_transfers_to_earliest_host() {
        let mut store = PodStore::default();
        let alice = caller("0xalice");
        let bob = caller("0xbob");
        let carol = caller("0xcarol");
        let pod_id = pod_with(&mut store, &alice);

        for member in [&bob, &carol] {
            store.join_pod(&pod_id, member).unwrap();
            store.request_co_host(&pod_id, &member.user_id).unwrap();
        }
        // Carol is promoted first, so she is the successor
        store
            .approve_co_host(&pod_id, &alice.user_id, &carol.user_id)
            .unwrap();
        store
            .approve_co_host(&pod_id, &alice.user_id, &bob.user_id)
            .unwrap();

        let outcome = store.leave_pod(&pod_id, &alice.user_id).unwrap();
        let LeaveOutcome::Departed(departure) = outcome else {
            panic!("pod should still be live");
        };
        assert!(departure.was_host);
        assert_eq!(departure.new_owner, Some(carol.user_id.clone()));
        assert_eq!(departure.snapshot.pod.owner, carol.user_id);
        assert_eq!(
            departure.snapshot.pod.hosts,
            vec![carol.user_id.clone(), bob.user_id.clone()]
        );
        assert_invariants(&store, &pod_id);
    }

    #[test]
    fn test_owner_leaving_without_hosts_keeps_owner_until_return() {
        let mut store = PodStore::default();
        let alice = caller("0xalice");
        let bob = caller("0xbob");
        let pod_id = pod_with(&mut store, &alice);
        store.join_pod(&pod_id, &bob).unwrap();

        let LeaveOutcome::Departed(departure) = store.leave_pod(&pod_id, &alice.user_id).unwrap()
        else {
            panic!("pod should still be live");
        };
        assert!(departure.new_owner.is_none());
        assert!(departure.snapshot.pod.hosts.is_empty());

        // Alice comes back and reclaims her host seat
        store.join_pod(&pod_id, &alice).unwrap();
        let snapshot = store.snapshot(&pod_id).unwrap();
        assert_eq!(snapshot.pod.hosts, vec![alice.user_id.clone()]);
        assert_invariants(&store, &pod_id);
    }

    #[test]
    fn test_absent_owner_has_no_authority() {
        let mut store = PodStore::default();
        let alice = caller("0xalice");
        let bob = caller("0xbob");
        let pod_id = pod_with(&mut store, &alice);
        store.join_pod(&pod_id, &bob).unwrap();
        store.leave_pod(&pod_id, &alice.user_id).unwrap();
        store.request_co_host(&pod_id, &bob.user_id).unwrap();

        let a = &alice.user_id;
        let denied = |result: Result<(), PodError>| {
            assert!(matches!(result, Err(PodError::PermissionDenied(_))));
        };
        denied(store.approve_co_host(&pod_id, a, &bob.user_id).map(|_| ()));
        denied(store.change_access_type(&pod_id, a, AccessType::Trusted).map(|_| ()));
        denied(store.approve_all_join_requests(&pod_id, a).map(|_| ()));
        denied(
            store
                .mute_member(&pod_id, a, &bob.user_id, MediaChannel::Audio, true)
                .map(|_| ()),
        );
        denied(store.mute_all(&pod_id, a, MediaChannel::Video, true).map(|_| ()));
        denied(store.update_content(&pod_id, a, "ipfs://z".to_string()).map(|_| ()));

        let snapshot = store.snapshot(&pod_id).unwrap();
        assert!(snapshot.pod.hosts.is_empty());
        assert_eq!(snapshot.pod.access_type, AccessType::Open);
        assert_eq!(snapshot.pod.content_reference, "ipfs://x");
        assert!(snapshot.member(&bob.user_id).unwrap().is_audio_enabled);
        assert_eq!(snapshot.co_host_requests.len(), 1);
        assert_invariants(&store, &pod_id);

        // Once back, the owner reclaims the host seat and can act again
        store.join_pod(&pod_id, &alice).unwrap();
        let promoted = store
            .approve_co_host(&pod_id, a, &bob.user_id)
            .unwrap()
            .unwrap();
        assert_eq!(
            promoted.pod.hosts,
            vec![alice.user_id.clone(), bob.user_id.clone()]
        );
        assert_invariants(&store, &pod_id);
    }

    #[test]
    fn test_invariants_hold_across_operation_sequence() {
        let mut store = PodStore::new(4);
        let alice = caller("0xalice");
        let bob = caller("0xbob");
        let carol = caller("0xcarol");
        let dave = caller("0xdave");
        let pod_id = pod_with(&mut store, &alice);
        let (a, b, c, d) = (
            alice.user_id.clone(),
            bob.user_id.clone(),
            carol.user_id.clone(),
            dave.user_id.clone(),
        );

        let steps: Vec<Box<dyn Fn(&mut PodStore) + '_>> = vec![
            Box::new(|s: &mut PodStore| {
                let _ = s.join_pod(&pod_id, &bob);
            }),
            Box::new(|s: &mut PodStore| {
                let _ = s.join_pod(&pod_id, &bob);
            }),
            Box::new(|s: &mut PodStore| {
                let _ = s.change_access_type(&pod_id, &a, AccessType::Trusted);
            }),
            Box::new(|s: &mut PodStore| {
                let _ = s.join_pod(&pod_id, &carol);
            }),
            Box::new(|s: &mut PodStore| {
                let _ = s.join_pod(&pod_id, &carol);
            }),
            Box::new(|s: &mut PodStore| {
                let _ = s.request_co_host(&pod_id, &c);
            }),
            Box::new(|s: &mut PodStore| {
                let _ = s.approve_join_request(&pod_id, &b, &c);
            }),
            Box::new(|s: &mut PodStore| {
                let _ = s.approve_join_request(&pod_id, &a, &c);
            }),
            Box::new(|s: &mut PodStore| {
                let _ = s.request_co_host(&pod_id, &c);
            }),
            Box::new(|s: &mut PodStore| {
                let _ = s.request_co_host(&pod_id, &b);
            }),
            Box::new(|s: &mut PodStore| {
                let _ = s.approve_co_host(&pod_id, &a, &b);
            }),
            Box::new(|s: &mut PodStore| {
                let _ = s.approve_co_host(&pod_id, &a, &b);
            }),
            Box::new(|s: &mut PodStore| {
                let _ = s.join_pod(&pod_id, &dave);
            }),
            // Owner leaves; bob succeeds
            Box::new(|s: &mut PodStore| {
                let _ = s.leave_pod(&pod_id, &a);
            }),
            Box::new(|s: &mut PodStore| {
                let _ = s.approve_co_host(&pod_id, &a, &c);
            }),
            Box::new(|s: &mut PodStore| {
                let _ = s.approve_co_host(&pod_id, &b, &c);
            }),
            Box::new(|s: &mut PodStore| {
                let _ = s.change_access_type(&pod_id, &b, AccessType::Open);
            }),
            // Both hosts leave; dave stays without a present owner
            Box::new(|s: &mut PodStore| {
                let _ = s.leave_pod(&pod_id, &b);
            }),
            Box::new(|s: &mut PodStore| {
                let _ = s.leave_pod(&pod_id, &c);
            }),
            Box::new(|s: &mut PodStore| {
                let _ = s.join_pod(&pod_id, &alice);
            }),
            Box::new(|s: &mut PodStore| {
                let _ = s.request_co_host(&pod_id, &d);
            }),
            Box::new(|s: &mut PodStore| {
                let _ = s.approve_co_host(&pod_id, &b, &d);
            }),
            Box::new(|s: &mut PodStore| {
                let _ = s.approve_co_host(&pod_id, &d, &d);
            }),
            Box::new(|s: &mut PodStore| {
                let _ = s.mute_all(&pod_id, &d, MediaChannel::Audio, true);
            }),
            Box::new(|s: &mut PodStore| {
                let _ = s.leave_pod(&pod_id, &d);
            }),
        ];

        for (index, step) in steps.iter().enumerate() {
            step(&mut store);
            assert!(store.contains(&pod_id), "pod vanished at step {index}");
            assert_invariants(&store, &pod_id);
        }

        let snapshot = store.snapshot(&pod_id).unwrap();
        assert!(snapshot.pod.hosts.is_empty());
        assert_eq!(snapshot.member_ids(), vec![alice.user_id.clone()]);
        // Carol was the successor once bob left
        assert_eq!(snapshot.pod.owner, c);
    }

    #[test]
    fn test_opening_over_capacity_changes_nothing() {
        let mut store = PodStore::new(2);
        let alice = caller("0xalice");
        let pod_id = pod_with(&mut store, &alice);
        store
            .change_access_type(&pod_id, &alice.user_id, AccessType::Trusted)
            .unwrap();
        store.join_pod(&pod_id, &caller("0xc")).unwrap();
        store.join_pod(&pod_id, &caller("0xd")).unwrap();

        let result = store.change_access_type(&pod_id, &alice.user_id, AccessType::Open);
        assert!(matches!(result, Err(PodError::CapacityExceeded(_))));

        let snapshot = store.snapshot(&pod_id).unwrap();
        assert_eq!(snapshot.pod.access_type, AccessType::Trusted);
        assert_eq!(snapshot.join_requests.len(), 2);
        assert_eq!(snapshot.members.len(), 1);

        // With room for the whole queue the pod opens and the queue empties
        store.leave_pod(&pod_id, &UserId::new("0xd")).unwrap();
        let change = store
            .change_access_type(&pod_id, &alice.user_id, AccessType::Open)
            .unwrap();
        assert_eq!(change.admitted.len(), 1);
        assert!(change.snapshot.join_requests.is_empty());
        assert_eq!(change.snapshot.pod.access_type, AccessType::Open);
        assert_invariants(&store, &pod_id);
    }

    #[test]
    fn test_disconnect_only_removes_own_connection_records() {
        let mut store = PodStore::default();
        let alice = caller("0xalice");
        let bob_first = caller("0xbob");
        let bob_second = Caller::new(bob_first.user_id.clone(), ConnectionId::new());
        let pod_id = pod_with(&mut store, &alice);

        store.join_pod(&pod_id, &bob_first).unwrap();
        store.join_pod(&pod_id, &bob_second).unwrap();

        let LeaveOutcome::Departed(departure) = store
            .disconnect(&pod_id, &bob_second.user_id, bob_second.connection_id)
            .unwrap()
        else {
            panic!("pod should still be live");
        };
        assert!(departure.removal.is_empty());
        assert!(store
            .snapshot(&pod_id)
            .unwrap()
            .member(&bob_first.user_id)
            .is_some());

        let LeaveOutcome::Departed(departure) = store
            .disconnect(&pod_id, &bob_first.user_id, bob_first.connection_id)
            .unwrap()
        else {
            panic!("pod should still be live");
        };
        assert!(departure.removal.member.is_some());
        assert_eq!(
            store.snapshot(&pod_id).unwrap().member_ids(),
            vec![alice.user_id.clone()]
        );
        assert_invariants(&store, &pod_id);
    }

    #[test]
    fn test_last_member_leaving_tears_down() {
        let mut store = PodStore::default();
        let alice = caller("0xalice");
        let dave = caller("0xdave");
        let pod_id = pod_with(&mut store, &alice);
        store
            .change_access_type(&pod_id, &alice.user_id, AccessType::Trusted)
            .unwrap();
        store.join_pod(&pod_id, &dave).unwrap();

        let outcome = store.leave_pod(&pod_id, &alice.user_id).unwrap();
        assert!(matches!(outcome, LeaveOutcome::TornDown { .. }));
        assert!(!store.contains(&pod_id));
        assert!(matches!(
            store.snapshot(&pod_id),
            Err(PodError::PodNotFound(_))
        ));
        assert_eq!(store.member_count(), 0);
    }

    #[test]
    fn test_pending_requester_leaving() {
        let mut store = PodStore::default();
        let alice = caller("0xalice");
        let dave = caller("0xdave");
        let pod_id = pod_with(&mut store, &alice);
        store
            .change_access_type(&pod_id, &alice.user_id, AccessType::Trusted)
            .unwrap();
        store.join_pod(&pod_id, &dave).unwrap();

        let LeaveOutcome::Departed(departure) = store.leave_pod(&pod_id, &dave.user_id).unwrap()
        else {
            panic!("pod should still be live");
        };
        assert!(departure.removal.join_request.is_some());
        assert!(departure.removal.member.is_none());
        assert!(departure.snapshot.join_requests.is_empty());
    }

    #[test]
    fn test_leave_by_stranger_is_noop() {
        let mut store = PodStore::default();
        let alice = caller("0xalice");
        let pod_id = pod_with(&mut store, &alice);

        let LeaveOutcome::Departed(departure) =
            store.leave_pod(&pod_id, &UserId::new("0xeve")).unwrap()
        else {
            panic!("pod should still be live");
        };
        assert!(departure.removal.is_empty());
        assert_eq!(departure.snapshot.stats.member_count, 1);
    }

    #[test]
    fn test_media_updates() {
        let mut store = PodStore::default();
        let alice = caller("0xalice");
        let bob = caller("0xbob");
        let pod_id = pod_with(&mut store, &alice);
        store.join_pod(&pod_id, &bob).unwrap();

        let member = store
            .update_member_media(
                &pod_id,
                &bob.user_id,
                MediaUpdate {
                    audio: Some(false),
                    video: None,
                },
            )
            .unwrap()
            .unwrap();
        assert!(!member.is_audio_enabled);
        assert!(member.is_video_enabled);

        let stranger = store
            .update_member_media(&pod_id, &UserId::new("0xeve"), MediaUpdate::default())
            .unwrap();
        assert!(stranger.is_none());
    }

    #[test]
    fn test_mute_requires_host() {
        let mut store = PodStore::default();
        let alice = caller("0xalice");
        let bob = caller("0xbob");
        let pod_id = pod_with(&mut store, &alice);
        store.join_pod(&pod_id, &bob).unwrap();

        let denied = store.mute_member(
            &pod_id,
            &bob.user_id,
            &alice.user_id,
            MediaChannel::Audio,
            true,
        );
        assert!(matches!(denied, Err(PodError::PermissionDenied(_))));

        let muted = store
            .mute_member(&pod_id, &alice.user_id, &bob.user_id, MediaChannel::Video, true)
            .unwrap()
            .unwrap();
        assert!(!muted.is_video_enabled);
    }

    #[test]
    fn test_mute_all_skips_authority() {
        let mut store = PodStore::default();
        let alice = caller("0xalice");
        let pod_id = pod_with(&mut store, &alice);
        for name in ["0xb", "0xc"] {
            store.join_pod(&pod_id, &caller(name)).unwrap();
        }

        let affected = store
            .mute_all(&pod_id, &alice.user_id, MediaChannel::Audio, true)
            .unwrap();
        assert_eq!(affected.len(), 2);

        let snapshot = store.snapshot(&pod_id).unwrap();
        assert!(snapshot.member(&alice.user_id).unwrap().is_audio_enabled);
        assert!(!snapshot.member(&UserId::new("0xb")).unwrap().is_audio_enabled);
    }

    #[test]
    fn test_update_content() {
        let mut store = PodStore::default();
        let alice = caller("0xalice");
        let bob = caller("0xbob");
        let pod_id = pod_with(&mut store, &alice);
        store.join_pod(&pod_id, &bob).unwrap();

        let denied = store.update_content(&pod_id, &bob.user_id, "ipfs://y".to_string());
        assert!(matches!(denied, Err(PodError::PermissionDenied(_))));

        let updated = store
            .update_content(&pod_id, &alice.user_id, "ipfs://y".to_string())
            .unwrap()
            .unwrap();
        assert_eq!(updated.pod.content_reference, "ipfs://y");

        let unchanged = store
            .update_content(&pod_id, &alice.user_id, "ipfs://y".to_string())
            .unwrap();
        assert!(unchanged.is_none());
    }
}
