//! `PodShardActor` - owns the [`PodStore`] for a subset of pods.
//!
//! Pods are assigned to shards by hashing the pod ID, so every operation on
//! a given pod goes through one mailbox and is applied in arrival order.
//! The actor never performs I/O while handling a message: it mutates its
//! store, replies, and moves on. Broadcasting happens in the caller after
//! the reply arrives.

use crate::errors::PodError;
use crate::observability::metrics as prom;
use crate::pods::{
    AccessChange, AccessType, Admission, Caller, JoinOutcome, LeaveOutcome, MediaChannel,
    MediaUpdate, Member, PodSnapshot, PodStore,
};

use super::messages::{Reply, ShardMessage, ShardStatus};
use super::metrics::{ActorMetrics, ActorType, ControllerMetrics, MailboxMonitor};

use common::types::{ConnectionId, PodId, UserId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Channel buffer size for a shard mailbox.
const SHARD_CHANNEL_BUFFER: usize = 1000;

/// Handle to a `PodShardActor`.
#[derive(Clone, Debug)]
pub struct PodShardHandle {
    sender: mpsc::Sender<ShardMessage>,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
    shard_index: usize,
}

impl PodShardHandle {
    #[must_use]
    pub fn shard_index(&self) -> usize {
        self.shard_index
    }

    /// Send a request and wait for the shard's reply.
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> ShardMessage,
    ) -> Result<T, PodError> {
        let (tx, rx) = oneshot::channel();
        self.mailbox.record_enqueue();
        if let Err(e) = self.sender.send(build(tx)).await {
            self.mailbox.record_drop();
            return Err(PodError::Internal(format!("channel send failed: {e}")));
        }

        rx.await
            .map_err(|e| PodError::Internal(format!("response receive failed: {e}")))?
    }

    pub async fn create_pod(
        &self,
        pod_id: PodId,
        caller: Caller,
        content_reference: String,
    ) -> Result<PodSnapshot, PodError> {
        self.request(|respond_to| ShardMessage::CreatePod {
            pod_id,
            caller,
            content_reference,
            respond_to,
        })
        .await
    }

    pub async fn join_pod(&self, pod_id: PodId, caller: Caller) -> Result<JoinOutcome, PodError> {
        self.request(|respond_to| ShardMessage::JoinPod {
            pod_id,
            caller,
            respond_to,
        })
        .await
    }

    pub async fn leave_pod(
        &self,
        pod_id: PodId,
        user_id: UserId,
    ) -> Result<LeaveOutcome, PodError> {
        self.request(|respond_to| ShardMessage::LeavePod {
            pod_id,
            user_id,
            respond_to,
        })
        .await
    }

    pub async fn disconnect(
        &self,
        pod_id: PodId,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> Result<LeaveOutcome, PodError> {
        self.request(|respond_to| ShardMessage::Disconnect {
            pod_id,
            user_id,
            connection_id,
            respond_to,
        })
        .await
    }

    pub async fn request_co_host(
        &self,
        pod_id: PodId,
        user_id: UserId,
    ) -> Result<Option<PodSnapshot>, PodError> {
        self.request(|respond_to| ShardMessage::RequestCoHost {
            pod_id,
            user_id,
            respond_to,
        })
        .await
    }

    pub async fn approve_co_host(
        &self,
        pod_id: PodId,
        approver: UserId,
        target: UserId,
    ) -> Result<Option<PodSnapshot>, PodError> {
        self.request(|respond_to| ShardMessage::ApproveCoHost {
            pod_id,
            approver,
            target,
            respond_to,
        })
        .await
    }

    pub async fn change_access_type(
        &self,
        pod_id: PodId,
        caller: UserId,
        access_type: AccessType,
    ) -> Result<AccessChange, PodError> {
        self.request(|respond_to| ShardMessage::ChangeAccessType {
            pod_id,
            caller,
            access_type,
            respond_to,
        })
        .await
    }

    pub async fn approve_join_request(
        &self,
        pod_id: PodId,
        approver: UserId,
        target: UserId,
    ) -> Result<Option<Admission>, PodError> {
        self.request(|respond_to| ShardMessage::ApproveJoinRequest {
            pod_id,
            approver,
            target,
            respond_to,
        })
        .await
    }

    pub async fn approve_all_join_requests(
        &self,
        pod_id: PodId,
        approver: UserId,
    ) -> Result<Admission, PodError> {
        self.request(|respond_to| ShardMessage::ApproveAllJoinRequests {
            pod_id,
            approver,
            respond_to,
        })
        .await
    }

    pub async fn update_member_media(
        &self,
        pod_id: PodId,
        user_id: UserId,
        update: MediaUpdate,
    ) -> Result<Option<Member>, PodError> {
        self.request(|respond_to| ShardMessage::UpdateMemberMedia {
            pod_id,
            user_id,
            update,
            respond_to,
        })
        .await
    }

    pub async fn mute_member(
        &self,
        pod_id: PodId,
        authority: UserId,
        target: UserId,
        channel: MediaChannel,
        muted: bool,
    ) -> Result<Option<Member>, PodError> {
        self.request(|respond_to| ShardMessage::MuteMember {
            pod_id,
            authority,
            target,
            channel,
            muted,
            respond_to,
        })
        .await
    }

    pub async fn mute_all(
        &self,
        pod_id: PodId,
        authority: UserId,
        channel: MediaChannel,
        muted: bool,
    ) -> Result<Vec<Member>, PodError> {
        self.request(|respond_to| ShardMessage::MuteAll {
            pod_id,
            authority,
            channel,
            muted,
            respond_to,
        })
        .await
    }

    pub async fn update_content(
        &self,
        pod_id: PodId,
        caller: UserId,
        content_reference: String,
    ) -> Result<Option<PodSnapshot>, PodError> {
        self.request(|respond_to| ShardMessage::UpdateContent {
            pod_id,
            caller,
            content_reference,
            respond_to,
        })
        .await
    }

    pub async fn get_pod(&self, pod_id: PodId) -> Result<PodSnapshot, PodError> {
        self.request(|respond_to| ShardMessage::GetPod { pod_id, respond_to })
            .await
    }

    pub async fn get_members(&self, pod_id: PodId) -> Result<Vec<Member>, PodError> {
        self.request(|respond_to| ShardMessage::GetMembers { pod_id, respond_to })
            .await
    }

    pub async fn get_status(&self) -> Result<ShardStatus, PodError> {
        let (tx, rx) = oneshot::channel();
        self.mailbox.record_enqueue();
        if let Err(e) = self
            .sender
            .send(ShardMessage::GetStatus { respond_to: tx })
            .await
        {
            self.mailbox.record_drop();
            return Err(PodError::Internal(format!("channel send failed: {e}")));
        }

        rx.await
            .map_err(|e| PodError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the shard actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// The `PodShardActor` implementation.
pub struct PodShardActor {
    shard_index: usize,
    receiver: mpsc::Receiver<ShardMessage>,
    cancel_token: CancellationToken,
    store: PodStore,
    metrics: Arc<ActorMetrics>,
    controller_metrics: Arc<ControllerMetrics>,
    mailbox: Arc<MailboxMonitor>,
}

impl PodShardActor {
    /// Spawn a shard actor owning an empty store.
    ///
    /// Returns a handle and the task join handle (for panic detection).
    pub fn spawn(
        shard_index: usize,
        max_members_per_pod: usize,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
        controller_metrics: Arc<ControllerMetrics>,
    ) -> (PodShardHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(SHARD_CHANNEL_BUFFER);
        let mailbox = Arc::new(MailboxMonitor::new(
            ActorType::Shard,
            shard_index.to_string(),
        ));

        let actor = Self {
            shard_index,
            receiver,
            cancel_token: cancel_token.clone(),
            store: PodStore::new(max_members_per_pod),
            metrics,
            controller_metrics,
            mailbox: Arc::clone(&mailbox),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = PodShardHandle {
            sender,
            cancel_token,
            mailbox,
            shard_index,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "pod.actor.shard", fields(shard = self.shard_index))]
    async fn run(mut self) {
        info!(
            target: "pod.actor.shard",
            shard = self.shard_index,
            "PodShardActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "pod.actor.shard",
                        shard = self.shard_index,
                        "PodShardActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.handle_message(message);
                            self.mailbox.record_dequeue();
                            self.metrics.record_message_processed();
                        }
                        None => {
                            info!(
                                target: "pod.actor.shard",
                                shard = self.shard_index,
                                "PodShardActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "pod.actor.shard",
            shard = self.shard_index,
            pods_remaining = self.store.pod_count(),
            messages_processed = self.mailbox.messages_processed(),
            "PodShardActor stopped"
        );
    }

    /// Handle a single message, keeping instance-wide counters in step with
    /// the store.
    fn handle_message(&mut self, message: ShardMessage) {
        debug!(
            target: "pod.actor.shard",
            shard = self.shard_index,
            operation = message.operation(),
            "Handling message"
        );

        let members_before = self.store.member_count();
        let pods_before = self.store.pod_count();

        self.dispatch(message);

        self.controller_metrics
            .adjust_members(members_before, self.store.member_count());
        // Slots are reserved by the controller before creation; the shard
        // only releases them on teardown.
        let pods_after = self.store.pod_count();
        if pods_after < pods_before {
            for _ in pods_after..pods_before {
                self.controller_metrics.release_pod();
                prom::record_teardown();
            }
        }
    }

    fn dispatch(&mut self, message: ShardMessage) {
        let store = &mut self.store;
        match message {
            ShardMessage::CreatePod {
                pod_id,
                caller,
                content_reference,
                respond_to,
            } => {
                let _ = respond_to.send(store.create_pod(pod_id, &caller, content_reference));
            }

            ShardMessage::JoinPod {
                pod_id,
                caller,
                respond_to,
            } => {
                let _ = respond_to.send(store.join_pod(&pod_id, &caller));
            }

            ShardMessage::LeavePod {
                pod_id,
                user_id,
                respond_to,
            } => {
                let _ = respond_to.send(store.leave_pod(&pod_id, &user_id));
            }

            ShardMessage::Disconnect {
                pod_id,
                user_id,
                connection_id,
                respond_to,
            } => {
                let _ = respond_to.send(store.disconnect(&pod_id, &user_id, connection_id));
            }

            ShardMessage::RequestCoHost {
                pod_id,
                user_id,
                respond_to,
            } => {
                let _ = respond_to.send(store.request_co_host(&pod_id, &user_id));
            }

            ShardMessage::ApproveCoHost {
                pod_id,
                approver,
                target,
                respond_to,
            } => {
                let _ = respond_to.send(store.approve_co_host(&pod_id, &approver, &target));
            }

            ShardMessage::ChangeAccessType {
                pod_id,
                caller,
                access_type,
                respond_to,
            } => {
                let _ = respond_to.send(store.change_access_type(&pod_id, &caller, access_type));
            }

            ShardMessage::ApproveJoinRequest {
                pod_id,
                approver,
                target,
                respond_to,
            } => {
                let _ =
                    respond_to.send(store.approve_join_request(&pod_id, &approver, &target));
            }

            ShardMessage::ApproveAllJoinRequests {
                pod_id,
                approver,
                respond_to,
            } => {
                let _ = respond_to.send(store.approve_all_join_requests(&pod_id, &approver));
            }

            ShardMessage::UpdateMemberMedia {
                pod_id,
                user_id,
                update,
                respond_to,
            } => {
                let _ = respond_to.send(store.update_member_media(&pod_id, &user_id, update));
            }

            ShardMessage::MuteMember {
                pod_id,
                authority,
                target,
                channel,
                muted,
                respond_to,
            } => {
                let _ = respond_to.send(store.mute_member(
                    &pod_id, &authority, &target, channel, muted,
                ));
            }

            ShardMessage::MuteAll {
                pod_id,
                authority,
                channel,
                muted,
                respond_to,
            } => {
                let _ = respond_to.send(store.mute_all(&pod_id, &authority, channel, muted));
            }

            ShardMessage::UpdateContent {
                pod_id,
                caller,
                content_reference,
                respond_to,
            } => {
                let _ =
                    respond_to.send(store.update_content(&pod_id, &caller, content_reference));
            }

            ShardMessage::GetPod { pod_id, respond_to } => {
                let _ = respond_to.send(store.snapshot(&pod_id));
            }

            ShardMessage::GetMembers { pod_id, respond_to } => {
                let _ = respond_to.send(store.members(&pod_id));
            }

            ShardMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(ShardStatus {
                    shard_index: self.shard_index,
                    pod_count: store.pod_count(),
                    member_count: store.member_count(),
                });
            }
        }
    }
}
