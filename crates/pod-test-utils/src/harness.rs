//! A controller, dispatcher and [`RecordingBroadcaster`] wired together.

use crate::fixtures::{test_controller, TestWallet};
use crate::recording::RecordingBroadcaster;
use common::types::PodId;
use pod_service::actors::{ControllerLimits, PodController};
use pod_service::pods::{Caller, PodSnapshot};
use pod_service::signaling::{ConnectionSession, PodCommand, Reply, SignalingDispatcher};
use std::sync::Arc;

pub struct TestHarness {
    pub controller: PodController,
    pub dispatcher: SignalingDispatcher,
    pub recorder: Arc<RecordingBroadcaster>,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    /// Harness with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(ControllerLimits::default())
    }

    #[must_use]
    pub fn with_limits(limits: ControllerLimits) -> Self {
        let controller = test_controller(limits);
        let recorder = Arc::new(RecordingBroadcaster::new());
        let dispatcher = SignalingDispatcher::new(controller.clone(), recorder.clone());
        Self {
            controller,
            dispatcher,
            recorder,
        }
    }

    pub async fn dispatch(&self, caller: &Caller, command: PodCommand) -> Reply {
        self.dispatcher.dispatch(caller, command).await
    }

    /// A connection session for `wallet` on a fresh connection.
    #[must_use]
    pub fn connect(&self, wallet: &TestWallet) -> ConnectionSession {
        ConnectionSession::new(wallet.caller(), self.dispatcher.clone())
    }

    /// Create a pod as `caller` and return its snapshot.
    ///
    /// # Panics
    ///
    /// If the reply is not `pod-created`.
    pub async fn create_pod(&self, caller: &Caller) -> PodSnapshot {
        match self
            .dispatch(
                caller,
                PodCommand::Create {
                    content_reference: String::new(),
                },
            )
            .await
        {
            Reply::PodCreated { pod } => pod,
            other => panic!("expected pod-created, got {other:?}"),
        }
    }

    /// Current snapshot straight from the controller.
    ///
    /// # Panics
    ///
    /// If the pod does not exist.
    pub async fn snapshot(&self, pod_id: &PodId) -> PodSnapshot {
        self.controller
            .get_pod(pod_id.clone())
            .await
            .expect("pod exists")
    }
}

impl std::fmt::Debug for TestHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestHarness")
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}
