//! Command dispatch: run a command against the controller, then publish the
//! resulting events.
//!
//! Broadcasting happens strictly after the owning shard has replied, so a
//! slow or absent client can never stall pod state. Error replies carry
//! client-safe messages; details are logged here.

use crate::actors::PodController;
use crate::broadcast::EventBroadcaster;
use crate::errors::PodError;
use crate::observability::metrics as prom;
use crate::pods::{
    Admission, Caller, JoinOutcome, LeaveOutcome, MediaUpdate, Member, PodSnapshot,
};

use super::commands::PodCommand;
use super::events::{PodEvent, Reply, ServerMessage};

use common::types::PodId;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Outcome label for command metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Applied,
    Noop,
    Error,
}

impl Outcome {
    const fn as_str(self) -> &'static str {
        match self {
            Outcome::Applied => "applied",
            Outcome::Noop => "noop",
            Outcome::Error => "error",
        }
    }

    const fn from_applied(applied: bool) -> Self {
        if applied {
            Outcome::Applied
        } else {
            Outcome::Noop
        }
    }
}

/// Runs commands for authenticated callers.
#[derive(Clone)]
pub struct SignalingDispatcher {
    controller: PodController,
    broadcaster: Arc<dyn EventBroadcaster>,
}

impl std::fmt::Debug for SignalingDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalingDispatcher")
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

impl SignalingDispatcher {
    #[must_use]
    pub fn new(controller: PodController, broadcaster: Arc<dyn EventBroadcaster>) -> Self {
        Self {
            controller,
            broadcaster,
        }
    }

    #[must_use]
    pub fn controller(&self) -> &PodController {
        &self.controller
    }

    /// Execute one command and return the reply for the caller.
    #[instrument(skip_all, name = "pod.signaling.dispatch", fields(command = command.name()))]
    pub async fn dispatch(&self, caller: &Caller, command: PodCommand) -> Reply {
        let name = command.name();
        let started = Instant::now();

        let (reply, outcome) = match self.execute(caller, command).await {
            Ok((reply, outcome)) => (reply, outcome),
            Err(err) => {
                log_error(name, &err);
                (Reply::from_error(&err), Outcome::Error)
            }
        };

        prom::record_command(name, outcome.as_str(), started.elapsed());
        reply
    }

    /// Leave a pod because the caller's connection closed. Only records
    /// created by that connection are removed.
    #[instrument(skip_all, name = "pod.signaling.disconnect", fields(pod_id = %pod_id))]
    pub async fn disconnect(&self, caller: &Caller, pod_id: PodId) -> Reply {
        let started = Instant::now();

        let (reply, outcome) = match self.controller.disconnect(pod_id.clone(), caller).await {
            Ok(departure) => {
                let applied = self.publish_departure(departure);
                (Reply::Left { pod_id }, Outcome::from_applied(applied))
            }
            Err(err) => {
                log_error("disconnect", &err);
                (Reply::from_error(&err), Outcome::Error)
            }
        };

        prom::record_command("disconnect", outcome.as_str(), started.elapsed());
        reply
    }

    async fn execute(
        &self,
        caller: &Caller,
        command: PodCommand,
    ) -> Result<(Reply, Outcome), PodError> {
        let user_id = caller.user_id.clone();
        let name = command.name();

        match command {
            PodCommand::Create { content_reference } => {
                let snapshot = self
                    .controller
                    .create_pod(caller.clone(), content_reference)
                    .await?;
                info!(
                    target: "pod.signaling",
                    pod_id = %snapshot.pod.id,
                    "Pod created"
                );
                Ok((Reply::PodCreated { pod: snapshot }, Outcome::Applied))
            }

            PodCommand::Join { pod_id } => {
                match self.controller.join_pod(pod_id.clone(), caller.clone()).await? {
                    JoinOutcome::Joined {
                        member,
                        newly_joined,
                        snapshot,
                    } => {
                        if newly_joined {
                            self.broadcaster.broadcast(
                                &pod_id,
                                PodEvent::UserJoined {
                                    pod_id: pod_id.clone(),
                                    member,
                                },
                            );
                            self.broadcast_stats(&snapshot);
                        }
                        Ok((
                            Reply::Joined { pod: snapshot },
                            Outcome::from_applied(newly_joined),
                        ))
                    }
                    JoinOutcome::Requested {
                        newly_requested,
                        snapshot,
                        ..
                    } => {
                        if newly_requested {
                            self.broadcast_stats(&snapshot);
                        }
                        Ok((
                            Reply::JoinRequested { pod_id },
                            Outcome::from_applied(newly_requested),
                        ))
                    }
                }
            }

            PodCommand::Leave { pod_id } => {
                let outcome = self.controller.leave_pod(pod_id.clone(), user_id).await?;
                let applied = self.publish_departure(outcome);
                Ok((Reply::Left { pod_id }, Outcome::from_applied(applied)))
            }

            PodCommand::RequestCoHost { pod_id } => {
                let result = self
                    .controller
                    .request_co_host(pod_id.clone(), user_id)
                    .await?;
                let pending = result.is_some();
                if let Some(snapshot) = result {
                    self.broadcast_stats(&snapshot);
                }
                Ok((
                    Reply::CoHostRequested { pod_id, pending },
                    Outcome::from_applied(pending),
                ))
            }

            PodCommand::ApproveCoHost { pod_id, target_id } => {
                let result = self
                    .controller
                    .approve_co_host(pod_id.clone(), user_id, target_id.clone())
                    .await?;
                let applied = result.is_some();
                if let Some(snapshot) = result {
                    self.broadcaster.broadcast(
                        &pod_id,
                        PodEvent::CoHostApproved {
                            pod_id: pod_id.clone(),
                            user_id: target_id,
                            hosts: snapshot.pod.hosts.clone(),
                        },
                    );
                    self.broadcast_stats(&snapshot);
                }
                Ok((Reply::ack(name, pod_id, applied), Outcome::from_applied(applied)))
            }

            PodCommand::ChangeAccessType {
                pod_id,
                access_type,
            } => {
                let change = self
                    .controller
                    .change_access_type(pod_id.clone(), user_id, access_type)
                    .await?;
                let applied = change.previous != access_type || !change.admitted.is_empty();

                if applied {
                    self.broadcaster.broadcast(
                        &pod_id,
                        PodEvent::PodTypeChanged {
                            pod_id: pod_id.clone(),
                            access_type,
                            admitted: change.admitted.iter().map(|m| m.user_id.clone()).collect(),
                        },
                    );
                    self.publish_admission(&change.admitted, &change.snapshot);
                }
                Ok((Reply::ack(name, pod_id, applied), Outcome::from_applied(applied)))
            }

            PodCommand::ApproveJoinRequest { pod_id, target_id } => {
                let result = self
                    .controller
                    .approve_join_request(pod_id.clone(), user_id, target_id)
                    .await?;
                let applied = result.is_some();
                if let Some(Admission { admitted, snapshot }) = result {
                    for member in &admitted {
                        self.broadcaster.broadcast(
                            &pod_id,
                            PodEvent::JoinRequestApproved {
                                pod_id: pod_id.clone(),
                                member: member.clone(),
                            },
                        );
                    }
                    self.publish_admission(&admitted, &snapshot);
                }
                Ok((Reply::ack(name, pod_id, applied), Outcome::from_applied(applied)))
            }

            PodCommand::ApproveAllJoinRequests { pod_id } => {
                let Admission { admitted, snapshot } = self
                    .controller
                    .approve_all_join_requests(pod_id.clone(), user_id)
                    .await?;
                let applied = !admitted.is_empty();
                if applied {
                    self.broadcaster.broadcast(
                        &pod_id,
                        PodEvent::AllJoinRequestsApproved {
                            pod_id: pod_id.clone(),
                            members: admitted.clone(),
                        },
                    );
                    self.publish_admission(&admitted, &snapshot);
                }
                Ok((Reply::ack(name, pod_id, applied), Outcome::from_applied(applied)))
            }

            PodCommand::UpdateMedia {
                pod_id,
                audio,
                video,
            } => {
                let update = MediaUpdate { audio, video };
                let result = self
                    .controller
                    .update_member_media(pod_id.clone(), user_id, update)
                    .await?;
                let applied = result.is_some();
                if let Some(member) = result {
                    if update.audio.is_some() {
                        self.broadcaster.broadcast(
                            &pod_id,
                            PodEvent::UserAudioToggle {
                                pod_id: pod_id.clone(),
                                user_id: member.user_id.clone(),
                                enabled: member.is_audio_enabled,
                            },
                        );
                    }
                    if update.video.is_some() {
                        self.broadcaster.broadcast(
                            &pod_id,
                            PodEvent::UserVideoToggle {
                                pod_id: pod_id.clone(),
                                user_id: member.user_id.clone(),
                                enabled: member.is_video_enabled,
                            },
                        );
                    }
                }
                Ok((Reply::ack(name, pod_id, applied), Outcome::from_applied(applied)))
            }

            PodCommand::MuteMember {
                pod_id,
                target_id,
                channel,
                muted,
            } => {
                let result = self
                    .controller
                    .mute_member(pod_id.clone(), user_id.clone(), target_id, channel, muted)
                    .await?;
                let applied = result.is_some();
                if let Some(member) = result {
                    self.broadcaster.broadcast(
                        &pod_id,
                        PodEvent::UserMuted {
                            pod_id: pod_id.clone(),
                            user_id: member.user_id,
                            channel,
                            muted,
                            muted_by: user_id,
                        },
                    );
                }
                Ok((Reply::ack(name, pod_id, applied), Outcome::from_applied(applied)))
            }

            PodCommand::MuteAll {
                pod_id,
                channel,
                muted,
            } => {
                let affected = self
                    .controller
                    .mute_all(pod_id.clone(), user_id.clone(), channel, muted)
                    .await?;
                let applied = !affected.is_empty();
                self.broadcaster.broadcast(
                    &pod_id,
                    PodEvent::AllUsersMuted {
                        pod_id: pod_id.clone(),
                        channel,
                        muted,
                        muted_by: user_id,
                        user_ids: affected.into_iter().map(|m| m.user_id).collect(),
                    },
                );
                Ok((Reply::ack(name, pod_id, applied), Outcome::from_applied(applied)))
            }

            PodCommand::UpdateContent {
                pod_id,
                content_reference,
            } => {
                let result = self
                    .controller
                    .update_content(pod_id.clone(), user_id, content_reference)
                    .await?;
                let applied = result.is_some();
                if let Some(snapshot) = result {
                    self.broadcaster.broadcast(
                        &pod_id,
                        PodEvent::ContentUpdated {
                            pod_id: pod_id.clone(),
                            content_reference: snapshot.pod.content_reference,
                        },
                    );
                }
                Ok((Reply::ack(name, pod_id, applied), Outcome::from_applied(applied)))
            }

            PodCommand::GetPod { pod_id } => {
                let snapshot = self.controller.get_pod(pod_id).await?;
                Ok((Reply::PodState { pod: snapshot }, Outcome::Applied))
            }
        }
    }

    /// Publish the events for a leave. Returns whether anything changed.
    fn publish_departure(&self, outcome: LeaveOutcome) -> bool {
        match outcome {
            LeaveOutcome::Departed(departure) => {
                if departure.removal.is_empty() {
                    return false;
                }
                let pod_id = departure.snapshot.pod.id.clone();
                if departure.removal.member.is_some() {
                    self.broadcaster.broadcast(
                        &pod_id,
                        PodEvent::UserLeft {
                            pod_id: pod_id.clone(),
                            user_id: departure.user_id.clone(),
                        },
                    );
                }
                if let Some(owner) = departure.new_owner {
                    info!(target: "pod.signaling", pod_id = %pod_id, "Pod ownership transferred");
                    self.broadcaster.broadcast(
                        &pod_id,
                        PodEvent::PodOwnerChanged {
                            pod_id: pod_id.clone(),
                            owner,
                        },
                    );
                }
                self.broadcast_stats(&departure.snapshot);
                true
            }
            LeaveOutcome::TornDown {
                pod_id, removal, ..
            } => {
                info!(target: "pod.signaling", pod_id = %pod_id, "Pod torn down");
                !removal.is_empty()
            }
        }
    }

    /// Announce admitted requesters to the pod and hand each one the pod
    /// state privately.
    fn publish_admission(&self, admitted: &[Member], snapshot: &PodSnapshot) {
        if admitted.is_empty() {
            return;
        }
        let pod_id = &snapshot.pod.id;
        for member in admitted {
            self.broadcaster.broadcast(
                pod_id,
                PodEvent::UserJoined {
                    pod_id: pod_id.clone(),
                    member: member.clone(),
                },
            );
            self.broadcaster.notify_user(
                &member.user_id,
                ServerMessage::Reply(Reply::Joined {
                    pod: snapshot.clone(),
                }),
            );
        }
        self.broadcast_stats(snapshot);
    }

    fn broadcast_stats(&self, snapshot: &PodSnapshot) {
        self.broadcaster.broadcast(
            &snapshot.pod.id,
            PodEvent::PodStatsUpdated {
                pod_id: snapshot.pod.id.clone(),
                stats: snapshot.stats,
            },
        );
    }
}

fn log_error(command: &'static str, err: &PodError) {
    match err {
        PodError::PermissionDenied(_) => {
            warn!(target: "pod.signaling", command = command, error = %err, "Unauthorized command");
        }
        PodError::Internal(_) => {
            error!(target: "pod.signaling", command = command, error = %err, "Command failed");
        }
        PodError::CapacityExceeded(_) | PodError::IdSpaceExhausted { .. } => {
            warn!(target: "pod.signaling", command = command, error = %err, "Command rejected at capacity");
        }
        _ => {
            debug!(target: "pod.signaling", command = command, error = %err, "Command rejected");
        }
    }
}
