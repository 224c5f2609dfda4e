use std::time::Duration;

use edgecast_core::{CameraDevice, PeerId, StreamType};
use edgecast_gateway::SessionState;
use edgecast_gateway::router::InboundFrame;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::create_test_router;
use crate::integration::init_tracing;

#[tokio::test]
async fn test_join_creates_session_and_sends_offer() {
    init_tracing();
    let t = create_test_router();
    let peer_id = PeerId::from("v1");

    t.router
        .dispatch(r#"{"action":"peer_joined","message":{"peer_id":"v1","source":"Thermal/main"}}"#)
        .await;

    let info = t.parts.registry.peer_info(&peer_id).await.expect("peer added");
    assert_eq!(info.device, CameraDevice::Thermal);
    assert_eq!(info.stream_type, StreamType::Main);
    assert_eq!(info.state, SessionState::Connecting);
    assert!(t.parts.signaling.offer_for(&peer_id).await.is_some());
}

#[tokio::test]
async fn test_answer_and_candidates_complete_negotiation() {
    init_tracing();
    let t = create_test_router();
    let peer_id = PeerId::from("v2");

    t.router
        .dispatch(r#"{"action":"ROOM_PEER_JOINED","message":{"peer_id":"v2"}}"#)
        .await;
    t.router
        .dispatch(
            r#"{"action":"candidate","message":{"peer_id":"v2","ice":{"candidate":"candidate:1","sdpMLineIndex":0}}}"#,
        )
        .await;
    t.router
        .dispatch(r#"{"action":"answer","message":{"peer_id":"v2","sdp":{"type":"answer","sdp":"v=0"}}}"#)
        .await;

    let info = t.parts.registry.peer_info(&peer_id).await.unwrap();
    assert_eq!(info.state, SessionState::Connected);
    assert_eq!(info.device, CameraDevice::Rgb);
    let route = t.parts.engine.route(&peer_id).unwrap();
    assert_eq!(route.candidates(), vec![("candidate:1".to_string(), 0)]);
}

#[tokio::test]
async fn test_leave_removes_session() {
    init_tracing();
    let t = create_test_router();

    t.router
        .dispatch(r#"{"action":"peer_joined","message":{"peer_id":"v3"}}"#)
        .await;
    assert_eq!(t.parts.registry.peer_count().await, 1);

    t.router
        .dispatch(r#"{"action":"peer_left","message":{"peer_id":"v3"}}"#)
        .await;
    assert_eq!(t.parts.registry.peer_count().await, 0);
    assert_eq!(t.parts.registry.ports().leased_count(), 0);

    // leaving twice is harmless
    t.router
        .dispatch(r#"{"action":"peer_left","message":{"peer_id":"v3"}}"#)
        .await;
}

#[tokio::test]
async fn test_status_ack_becomes_notice() {
    init_tracing();
    let mut t = create_test_router();

    t.router
        .dispatch(r#"{"action":"camstatus_reply","message":{}}"#)
        .await;

    assert!(t.notices.try_recv().is_ok());
}

#[tokio::test]
async fn test_run_processes_queue_in_order() {
    init_tracing();
    let t = create_test_router();
    let (tx, rx) = mpsc::channel(16);
    let shutdown = CancellationToken::new();
    let registry = t.parts.registry.clone();
    let task = tokio::spawn(t.router.run(rx, shutdown.clone()));

    for raw in [
        r#"{"action":"peer_joined","message":{"peer_id":"a"}}"#,
        r#"{"action":"peer_joined","message":{"peer_id":"b"}}"#,
        r#"{"action":"peer_left","message":{"peer_id":"a"}}"#,
    ] {
        let frame = InboundFrame {
            epoch: registry.epoch(),
            text: raw.to_string(),
        };
        tx.send(frame).await.unwrap();
    }
    drop(tx);

    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("router drains and stops")
        .unwrap();

    let peers = registry.all_peers().await;
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].peer_id, PeerId::from("b"));
}

#[tokio::test]
async fn test_frames_from_dropped_channel_are_discarded() {
    init_tracing();
    let t = create_test_router();
    let stale = t.parts.registry.epoch();

    // the channel went away: everything it delivered is void
    t.parts.registry.remove_all().await;

    t.router
        .dispatch_frame(InboundFrame {
            epoch: stale,
            text: r#"{"action":"peer_joined","message":{"peer_id":"ghost"}}"#.to_string(),
        })
        .await;
    assert_eq!(t.parts.registry.peer_count().await, 0);
    assert_eq!(t.parts.engine.added(), 0);
    assert!(t.parts.signaling.signals().await.is_empty());

    t.router
        .dispatch_frame(InboundFrame {
            epoch: t.parts.registry.epoch(),
            text: r#"{"action":"peer_joined","message":{"peer_id":"fresh"}}"#.to_string(),
        })
        .await;
    assert_eq!(t.parts.registry.peer_count().await, 1);
}
