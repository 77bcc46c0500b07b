//! `PodController` - routes pod operations to shard actors.
//!
//! The controller is the top of the actor hierarchy:
//!
//! - Spawns a fixed number of `PodShardActor` instances
//! - Maps every pod ID to exactly one shard
//! - Allocates fresh pod IDs, retrying on collision
//! - Enforces the instance-wide pod limit
//! - Owns the root `CancellationToken` for graceful shutdown
//! - Monitors shard tasks for panics (via `JoinHandle`)
//!
//! # Graceful Shutdown
//!
//! On SIGTERM, the controller:
//! 1. Stops accepting creates and joins (`Draining`)
//! 2. Cancels the root `CancellationToken` (propagates to all shards)

use crate::errors::PodError;
use crate::pods::{
    AccessChange, AccessType, Admission, Caller, JoinOutcome, LeaveOutcome, MediaChannel,
    MediaUpdate, Member, PodSnapshot,
};

use super::messages::ControllerStatus;
use super::metrics::{ActorMetrics, ActorType, ControllerMetrics};
use super::shard::{PodShardActor, PodShardHandle};

use common::types::{IdGenerationError, PodId, UserId};
use ring::rand::SystemRandom;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Default number of shard actors.
pub const DEFAULT_SHARD_COUNT: usize = 8;

/// Default instance-wide pod limit.
pub const DEFAULT_MAX_PODS: usize = 1000;

/// Attempts at drawing a non-colliding pod ID before giving up.
pub const MAX_ID_ATTEMPTS: usize = 8;

/// Source of candidate pod IDs.
pub trait PodIdSource: Send + Sync {
    /// Draw a candidate ID.
    ///
    /// # Errors
    ///
    /// Returns [`IdGenerationError`] if randomness is unavailable.
    fn next_id(&self) -> Result<PodId, IdGenerationError>;
}

impl PodIdSource for SystemRandom {
    fn next_id(&self) -> Result<PodId, IdGenerationError> {
        PodId::generate(self)
    }
}

/// Sizing for a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerLimits {
    pub shard_count: usize,
    pub max_pods: usize,
    pub max_members_per_pod: usize,
}

impl Default for ControllerLimits {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
            max_pods: DEFAULT_MAX_PODS,
            max_members_per_pod: crate::pods::DEFAULT_MAX_MEMBERS_PER_POD,
        }
    }
}

struct ControllerInner {
    instance_id: String,
    shards: Vec<PodShardHandle>,
    ids: Box<dyn PodIdSource>,
    limits: ControllerLimits,
    cancel_token: CancellationToken,
    draining: AtomicBool,
    metrics: Arc<ActorMetrics>,
    controller_metrics: Arc<ControllerMetrics>,
}

/// Cheaply cloneable handle shared by every connection task.
#[derive(Clone)]
pub struct PodController {
    inner: Arc<ControllerInner>,
}

impl std::fmt::Debug for PodController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PodController")
            .field("instance_id", &self.inner.instance_id)
            .field("limits", &self.inner.limits)
            .finish_non_exhaustive()
    }
}

impl PodController {
    /// Spawn the shard actors and return a handle, drawing pod IDs from the
    /// system RNG.
    #[must_use]
    pub fn new(
        instance_id: String,
        limits: ControllerLimits,
        metrics: Arc<ActorMetrics>,
        controller_metrics: Arc<ControllerMetrics>,
    ) -> Self {
        Self::with_id_source(
            instance_id,
            limits,
            Box::new(SystemRandom::new()),
            metrics,
            controller_metrics,
        )
    }

    /// Like [`PodController::new`] with a caller-supplied ID source.
    #[must_use]
    pub fn with_id_source(
        instance_id: String,
        limits: ControllerLimits,
        ids: Box<dyn PodIdSource>,
        metrics: Arc<ActorMetrics>,
        controller_metrics: Arc<ControllerMetrics>,
    ) -> Self {
        let cancel_token = CancellationToken::new();
        let shard_count = limits.shard_count.max(1);

        let mut shards = Vec::with_capacity(shard_count);
        for shard_index in 0..shard_count {
            let (handle, task) = PodShardActor::spawn(
                shard_index,
                limits.max_members_per_pod,
                cancel_token.child_token(),
                Arc::clone(&metrics),
                Arc::clone(&controller_metrics),
            );
            shards.push(handle);

            // Supervise: a shard task only finishes on its own if it panicked.
            let metrics = Arc::clone(&metrics);
            let instance = instance_id.clone();
            tokio::spawn(async move {
                if let Err(join_error) = task.await {
                    if join_error.is_panic() {
                        error!(
                            target: "pod.actor.controller",
                            instance_id = %instance,
                            shard = shard_index,
                            error = ?join_error,
                            "Shard actor panicked - pods on this shard are lost"
                        );
                        metrics.record_panic(ActorType::Shard);
                    }
                }
            });
        }

        info!(
            target: "pod.actor.controller",
            instance_id = %instance_id,
            shards = shard_count,
            max_pods = limits.max_pods,
            "PodController started"
        );

        Self {
            inner: Arc::new(ControllerInner {
                instance_id,
                shards,
                ids,
                limits,
                cancel_token,
                draining: AtomicBool::new(false),
                metrics,
                controller_metrics,
            }),
        }
    }

    /// Shard responsible for a pod ID.
    fn shard_for(&self, pod_id: &PodId) -> Result<&PodShardHandle, PodError> {
        let mut hasher = DefaultHasher::new();
        pod_id.hash(&mut hasher);
        let count = self.inner.shards.len().max(1);
        // Modulo keeps the value below `count`, which fits in usize.
        #[allow(clippy::cast_possible_truncation)]
        let index = (hasher.finish() % count as u64) as usize;
        self.inner
            .shards
            .get(index)
            .ok_or_else(|| PodError::Internal(format!("no shard at index {index}")))
    }

    fn ensure_accepting(&self) -> Result<(), PodError> {
        if self.inner.draining.load(Ordering::SeqCst) {
            return Err(PodError::Draining);
        }
        Ok(())
    }

    /// Create a pod with a fresh ID, the caller as owner and sole member.
    ///
    /// # Errors
    ///
    /// `Draining`, `CapacityExceeded` when at the pod limit,
    /// `IdSpaceExhausted` after repeated collisions, `Internal` on RNG or
    /// mailbox failure.
    pub async fn create_pod(
        &self,
        caller: Caller,
        content_reference: String,
    ) -> Result<PodSnapshot, PodError> {
        self.ensure_accepting()?;

        let max_pods = self.inner.limits.max_pods;
        if !self.inner.controller_metrics.try_reserve_pod(max_pods) {
            warn!(
                target: "pod.actor.controller",
                max_pods = max_pods,
                "Pod limit reached, rejecting create"
            );
            return Err(PodError::CapacityExceeded(
                "Server has reached its pod limit".to_string(),
            ));
        }

        let result = self.allocate_and_create(caller, content_reference).await;
        if result.is_err() {
            self.inner.controller_metrics.release_pod();
        }
        result
    }

    async fn allocate_and_create(
        &self,
        caller: Caller,
        content_reference: String,
    ) -> Result<PodSnapshot, PodError> {
        for attempt in 1..=MAX_ID_ATTEMPTS {
            let pod_id = self
                .inner
                .ids
                .next_id()
                .map_err(|e| PodError::Internal(e.to_string()))?;

            match self
                .shard_for(&pod_id)?
                .create_pod(pod_id, caller.clone(), content_reference.clone())
                .await
            {
                Err(PodError::Conflict(_)) => {
                    warn!(
                        target: "pod.actor.controller",
                        attempt = attempt,
                        "Pod ID collision, retrying"
                    );
                }
                other => return other,
            }
        }

        error!(
            target: "pod.actor.controller",
            attempts = MAX_ID_ATTEMPTS,
            "Pod ID allocation exhausted"
        );
        Err(PodError::IdSpaceExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    /// # Errors
    ///
    /// `Draining`, or any error from the owning shard.
    pub async fn join_pod(&self, pod_id: PodId, caller: Caller) -> Result<JoinOutcome, PodError> {
        self.ensure_accepting()?;
        self.shard_for(&pod_id)?.join_pod(pod_id, caller).await
    }

    /// Leaving is allowed while draining.
    ///
    /// # Errors
    ///
    /// Any error from the owning shard.
    pub async fn leave_pod(
        &self,
        pod_id: PodId,
        user_id: UserId,
    ) -> Result<LeaveOutcome, PodError> {
        self.shard_for(&pod_id)?.leave_pod(pod_id, user_id).await
    }

    /// Leave on behalf of a closing connection. Records held by another
    /// connection of the same user are kept.
    ///
    /// # Errors
    ///
    /// Any error from the owning shard.
    pub async fn disconnect(
        &self,
        pod_id: PodId,
        caller: &Caller,
    ) -> Result<LeaveOutcome, PodError> {
        self.shard_for(&pod_id)?
            .disconnect(pod_id, caller.user_id.clone(), caller.connection_id)
            .await
    }

    /// # Errors
    ///
    /// Any error from the owning shard.
    pub async fn request_co_host(
        &self,
        pod_id: PodId,
        user_id: UserId,
    ) -> Result<Option<PodSnapshot>, PodError> {
        self.shard_for(&pod_id)?
            .request_co_host(pod_id, user_id)
            .await
    }

    /// # Errors
    ///
    /// Any error from the owning shard.
    pub async fn approve_co_host(
        &self,
        pod_id: PodId,
        approver: UserId,
        target: UserId,
    ) -> Result<Option<PodSnapshot>, PodError> {
        self.shard_for(&pod_id)?
            .approve_co_host(pod_id, approver, target)
            .await
    }

    /// # Errors
    ///
    /// Any error from the owning shard.
    pub async fn change_access_type(
        &self,
        pod_id: PodId,
        caller: UserId,
        access_type: AccessType,
    ) -> Result<AccessChange, PodError> {
        self.shard_for(&pod_id)?
            .change_access_type(pod_id, caller, access_type)
            .await
    }

    /// # Errors
    ///
    /// Any error from the owning shard.
    pub async fn approve_join_request(
        &self,
        pod_id: PodId,
        approver: UserId,
        target: UserId,
    ) -> Result<Option<Admission>, PodError> {
        self.shard_for(&pod_id)?
            .approve_join_request(pod_id, approver, target)
            .await
    }

    /// # Errors
    ///
    /// Any error from the owning shard.
    pub async fn approve_all_join_requests(
        &self,
        pod_id: PodId,
        approver: UserId,
    ) -> Result<Admission, PodError> {
        self.shard_for(&pod_id)?
            .approve_all_join_requests(pod_id, approver)
            .await
    }

    /// # Errors
    ///
    /// Any error from the owning shard.
    pub async fn update_member_media(
        &self,
        pod_id: PodId,
        user_id: UserId,
        update: MediaUpdate,
    ) -> Result<Option<Member>, PodError> {
        self.shard_for(&pod_id)?
            .update_member_media(pod_id, user_id, update)
            .await
    }

    /// # Errors
    ///
    /// Any error from the owning shard.
    pub async fn mute_member(
        &self,
        pod_id: PodId,
        authority: UserId,
        target: UserId,
        channel: MediaChannel,
        muted: bool,
    ) -> Result<Option<Member>, PodError> {
        self.shard_for(&pod_id)?
            .mute_member(pod_id, authority, target, channel, muted)
            .await
    }

    /// # Errors
    ///
    /// Any error from the owning shard.
    pub async fn mute_all(
        &self,
        pod_id: PodId,
        authority: UserId,
        channel: MediaChannel,
        muted: bool,
    ) -> Result<Vec<Member>, PodError> {
        self.shard_for(&pod_id)?
            .mute_all(pod_id, authority, channel, muted)
            .await
    }

    /// # Errors
    ///
    /// Any error from the owning shard.
    pub async fn update_content(
        &self,
        pod_id: PodId,
        caller: UserId,
        content_reference: String,
    ) -> Result<Option<PodSnapshot>, PodError> {
        self.shard_for(&pod_id)?
            .update_content(pod_id, caller, content_reference)
            .await
    }

    /// # Errors
    ///
    /// `PodNotFound` if the pod does not exist.
    pub async fn get_pod(&self, pod_id: PodId) -> Result<PodSnapshot, PodError> {
        self.shard_for(&pod_id)?.get_pod(pod_id).await
    }

    /// # Errors
    ///
    /// `PodNotFound` if the pod does not exist.
    pub async fn get_members(&self, pod_id: PodId) -> Result<Vec<Member>, PodError> {
        self.shard_for(&pod_id)?.get_members(pod_id).await
    }

    /// Aggregate status from every shard.
    ///
    /// # Errors
    ///
    /// `Internal` if a shard mailbox is closed.
    pub async fn get_status(&self) -> Result<ControllerStatus, PodError> {
        let mut status = ControllerStatus {
            shard_count: self.inner.shards.len(),
            pod_count: 0,
            member_count: 0,
            is_draining: self.inner.draining.load(Ordering::SeqCst),
        };
        for shard in &self.inner.shards {
            let shard_status = shard.get_status().await?;
            status.pod_count += shard_status.pod_count;
            status.member_count += shard_status.member_count;
        }
        Ok(status)
    }

    /// Stop accepting creates and joins, then cancel every shard.
    pub fn shutdown(&self) {
        self.inner.draining.store(true, Ordering::SeqCst);
        info!(
            target: "pod.actor.controller",
            instance_id = %self.inner.instance_id,
            pods = self.inner.controller_metrics.pods(),
            messages_processed = self.inner.metrics.messages_processed(),
            "PodController shutting down"
        );
        self.inner.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel_token.is_cancelled()
    }

    #[must_use]
    pub fn controller_metrics(&self) -> &Arc<ControllerMetrics> {
        &self.inner.controller_metrics
    }

    #[must_use]
    pub fn limits(&self) -> ControllerLimits {
        self.inner.limits
    }
}
