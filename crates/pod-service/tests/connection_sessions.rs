//! Connection-level behavior: broadcast filtering and disconnect cleanup.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use pod_service::broadcast::{Audience, Envelope};
use pod_service::pods::AccessType;
use pod_service::signaling::{PodCommand, PodEvent, Reply, ServerMessage};
use pod_test_utils::{wallets, TestHarness};

#[tokio::test]
async fn test_session_tracks_created_and_joined_pods() {
    let harness = TestHarness::new();
    let [alice, bob, ..] = wallets();

    let mut alice_conn = harness.connect(&alice);
    let reply = alice_conn
        .handle_text(r#"{"type":"create","contentReference":"ipfs://x"}"#)
        .await;
    let Reply::PodCreated { pod } = reply else {
        panic!("expected pod-created, got {reply:?}");
    };
    let pod_id = pod.pod.id;
    assert!(alice_conn.joined().contains(&pod_id));

    let mut bob_conn = harness.connect(&bob);
    bob_conn
        .handle_command(PodCommand::Join {
            pod_id: pod_id.clone(),
        })
        .await;
    assert!(bob_conn.joined().contains(&pod_id));

    bob_conn
        .handle_command(PodCommand::Leave {
            pod_id: pod_id.clone(),
        })
        .await;
    assert!(bob_conn.joined().is_empty());
}

#[tokio::test]
async fn test_malformed_frame_gets_error_reply() {
    let harness = TestHarness::new();
    let [alice, ..] = wallets();
    let mut conn = harness.connect(&alice);

    let reply = conn.handle_text("{\"type\":\"join\"}").await;
    assert!(matches!(reply, Reply::Error { code: 1, .. }));
    assert!(conn.joined().is_empty());
}

#[tokio::test]
async fn test_accepts_only_tracked_pods() {
    let harness = TestHarness::new();
    let [alice, bob, ..] = wallets();

    let mut alice_conn = harness.connect(&alice);
    let bob_pod = harness.create_pod(&bob.caller()).await.pod.id;
    let Reply::PodCreated { pod } = alice_conn
        .handle_command(PodCommand::Create {
            content_reference: String::new(),
        })
        .await
    else {
        panic!("create failed");
    };
    let own_pod = pod.pod.id;

    let event = |pod_id| Envelope {
        audience: Audience::Pod(pod_id),
        message: Reply::Left {
            pod_id: own_pod.clone(),
        }
        .into(),
    };

    assert!(alice_conn.accepts(&event(own_pod.clone())));
    assert!(!alice_conn.accepts(&event(bob_pod)));

    let for_bob = Envelope {
        audience: Audience::User(bob.user_id()),
        message: Reply::Left {
            pod_id: own_pod.clone(),
        }
        .into(),
    };
    assert!(!alice_conn.accepts(&for_bob));
}

#[tokio::test]
async fn test_private_admission_moves_pending_to_joined() {
    let harness = TestHarness::new();
    let [alice, bob, ..] = wallets();
    let alice_caller = alice.caller();

    let pod_id = harness.create_pod(&alice_caller).await.pod.id;
    harness
        .dispatch(
            &alice_caller,
            PodCommand::ChangeAccessType {
                pod_id: pod_id.clone(),
                access_type: AccessType::Trusted,
            },
        )
        .await;

    let mut bob_conn = harness.connect(&bob);
    let reply = bob_conn
        .handle_command(PodCommand::Join {
            pod_id: pod_id.clone(),
        })
        .await;
    assert_eq!(
        reply,
        Reply::JoinRequested {
            pod_id: pod_id.clone()
        }
    );
    assert!(bob_conn.pending().contains(&pod_id));

    // A pending requester does not see pod broadcasts yet
    let pod_event = Envelope {
        audience: Audience::Pod(pod_id.clone()),
        message: Reply::Left {
            pod_id: pod_id.clone(),
        }
        .into(),
    };
    assert!(!bob_conn.accepts(&pod_event));

    harness.recorder.clear();
    harness
        .dispatch(
            &alice_caller,
            PodCommand::ApproveJoinRequest {
                pod_id: pod_id.clone(),
                target_id: bob.user_id(),
            },
        )
        .await;

    let private = harness
        .recorder
        .envelopes()
        .into_iter()
        .find(|e| e.audience == Audience::User(bob.user_id()))
        .expect("private joined notification");
    assert!(bob_conn.accepts(&private));
    assert!(bob_conn.joined().contains(&pod_id));
    assert!(bob_conn.pending().is_empty());
    assert!(bob_conn.accepts(&pod_event));

    // A second connection of the same user that never asked is not admitted
    let mut other_conn = harness.connect(&bob);
    assert!(!other_conn.accepts(&private));
    assert!(other_conn.joined().is_empty());
}

#[tokio::test]
async fn test_close_leaves_every_tracked_pod() {
    let harness = TestHarness::new();
    let [alice, bob, carol, _] = wallets();
    let alice_caller = alice.caller();

    let open_pod = harness.create_pod(&alice_caller).await.pod.id;
    let trusted_pod = harness.create_pod(&alice_caller).await.pod.id;
    harness
        .dispatch(
            &alice_caller,
            PodCommand::ChangeAccessType {
                pod_id: trusted_pod.clone(),
                access_type: AccessType::Trusted,
            },
        )
        .await;

    let mut bob_conn = harness.connect(&bob);
    bob_conn
        .handle_command(PodCommand::Join {
            pod_id: open_pod.clone(),
        })
        .await;
    bob_conn
        .handle_command(PodCommand::Join {
            pod_id: trusted_pod.clone(),
        })
        .await;

    // Carol's pod is torn down when her connection drops
    let mut carol_conn = harness.connect(&carol);
    let Reply::PodCreated { pod } = carol_conn
        .handle_command(PodCommand::Create {
            content_reference: String::new(),
        })
        .await
    else {
        panic!("create failed");
    };
    let carol_pod = pod.pod.id;
    assert_eq!(harness.controller.controller_metrics().pods(), 3);

    harness.recorder.clear();
    bob_conn.close().await;
    carol_conn.close().await;

    let open = harness.snapshot(&open_pod).await;
    assert_eq!(open.member_ids(), vec![alice.user_id()]);
    assert_eq!(
        harness.recorder.event_names(&open_pod),
        vec!["user-left", "pod-stats-updated"]
    );

    let trusted = harness.snapshot(&trusted_pod).await;
    assert!(trusted.join_requests.is_empty());

    assert!(harness.controller.get_pod(carol_pod).await.is_err());
    assert_eq!(harness.controller.controller_metrics().pods(), 2);
}

#[tokio::test]
async fn test_closing_second_socket_keeps_membership() {
    let harness = TestHarness::new();
    let [alice, bob, ..] = wallets();
    let pod_id = harness.create_pod(&alice.caller()).await.pod.id;

    let mut first = harness.connect(&bob);
    let mut second = harness.connect(&bob);
    for conn in [&mut first, &mut second] {
        let reply = conn
            .handle_command(PodCommand::Join {
                pod_id: pod_id.clone(),
            })
            .await;
        assert!(matches!(reply, Reply::Joined { .. }));
        assert!(conn.joined().contains(&pod_id));
    }

    harness.recorder.clear();
    second.close().await;

    let snapshot = harness.snapshot(&pod_id).await;
    assert!(snapshot.member(&bob.user_id()).is_some());
    assert!(harness.recorder.event_names(&pod_id).is_empty());

    let pod_event = Envelope {
        audience: Audience::Pod(pod_id.clone()),
        message: Reply::Left {
            pod_id: pod_id.clone(),
        }
        .into(),
    };
    assert!(first.accepts(&pod_event));
    assert!(first.joined().contains(&pod_id));
}

#[tokio::test]
async fn test_membership_removed_elsewhere_stops_forwarding() {
    let harness = TestHarness::new();
    let [alice, bob, ..] = wallets();
    let pod_id = harness.create_pod(&alice.caller()).await.pod.id;

    let mut first = harness.connect(&bob);
    let mut second = harness.connect(&bob);
    for conn in [&mut first, &mut second] {
        conn.handle_command(PodCommand::Join {
            pod_id: pod_id.clone(),
        })
        .await;
    }

    harness.recorder.clear();
    first.close().await;

    let snapshot = harness.snapshot(&pod_id).await;
    assert!(snapshot.member(&bob.user_id()).is_none());

    let user_left = harness
        .recorder
        .envelopes()
        .into_iter()
        .find(|e| {
            matches!(
                &e.message,
                ServerMessage::Event(PodEvent::UserLeft { user_id, .. }) if user_id == &bob.user_id()
            )
        })
        .expect("user-left broadcast");

    // The surviving socket sees its own departure, then nothing more
    assert!(second.accepts(&user_left));
    assert!(second.joined().is_empty());

    let later = Envelope {
        audience: Audience::Pod(pod_id.clone()),
        message: Reply::Left {
            pod_id: pod_id.clone(),
        }
        .into(),
    };
    assert!(!second.accepts(&later));
}
