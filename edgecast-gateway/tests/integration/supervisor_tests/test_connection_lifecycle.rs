use edgecast_core::{PeerId, SignalingMessage};
use edgecast_gateway::{ConnectionState, GatewayConfig};

use super::start_gateway;
use crate::integration::init_tracing;
use crate::utils::{MockTransport, wait_until};

#[tokio::test(start_paused = true)]
async fn test_connect_registers_camera() {
    init_tracing();
    let mut t = start_gateway(GatewayConfig::default(), MockTransport::new());

    assert!(t.wait_for_state(ConnectionState::Registered).await);
    assert_eq!(
        t.transport.connect_urls(),
        vec!["ws://127.0.0.1:8080/signaling/ai_cds/?token=test&peerType=camera".to_string()]
    );

    let sent = t.transport.sent();
    assert_eq!(
        sent[0],
        SignalingMessage::Register {
            camera_id: "ai_cds".to_string(),
            firmware_version: "1.0.0".to_string(),
            ai_version: "0.1.0".to_string(),
        }
    );

    t.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_heartbeats_and_ack() {
    init_tracing();
    let mut t = start_gateway(GatewayConfig::default(), MockTransport::new());
    assert!(t.wait_for_state(ConnectionState::Registered).await);

    let transport = t.transport.clone();
    let beating = wait_until(10_000, || {
        let transport = transport.clone();
        async move {
            transport
                .sent_actions()
                .iter()
                .filter(|a| **a == "camstatus")
                .count()
                >= 2
        }
    })
    .await;
    assert!(beating, "status heartbeats should flow once registered");
    assert!(t.counters.snapshot().unacked_heartbeats >= 2);

    t.transport.deliver(&SignalingMessage::StatusAck).await;
    assert!(t.wait_for_state(ConnectionState::Running).await);
    assert_eq!(t.counters.snapshot().unacked_heartbeats, 0);

    let status = t
        .transport
        .sent()
        .into_iter()
        .find(|m| matches!(m, SignalingMessage::CameraStatus { .. }))
        .unwrap();
    assert!(matches!(
        status,
        SignalingMessage::CameraStatus { cpu_temp: 41, ref record_status, .. } if record_status == "On"
    ));

    t.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_joined_viewer_gets_offer_over_transport() {
    init_tracing();
    let mut t = start_gateway(GatewayConfig::default(), MockTransport::new());
    assert!(t.wait_for_state(ConnectionState::Registered).await);

    t.transport
        .deliver(&SignalingMessage::PeerJoined {
            peer_id: PeerId::from("viewer"),
            source: "RGB/main".to_string(),
        })
        .await;

    let transport = t.transport.clone();
    let offered = wait_until(5_000, || {
        let transport = transport.clone();
        async move { transport.sent_actions().contains(&"offer") }
    })
    .await;
    assert!(offered);

    let offer = t
        .transport
        .sent()
        .into_iter()
        .find_map(|m| match m {
            SignalingMessage::Offer { peer_id, sdp } => Some((peer_id, sdp)),
            _ => None,
        })
        .unwrap();
    assert_eq!(offer.0, PeerId::from("viewer"));
    assert!(offer.1.starts_with("offer-viewer#"));
    assert!(t.counters.snapshot().messages_received >= 1);

    t.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_tears_down_peers() {
    init_tracing();
    let mut t = start_gateway(GatewayConfig::default(), MockTransport::new());
    assert!(t.wait_for_state(ConnectionState::Registered).await);

    t.transport
        .deliver(&SignalingMessage::PeerJoined {
            peer_id: PeerId::from("viewer"),
            source: "RGB".to_string(),
        })
        .await;
    let registry = t.registry.clone();
    assert!(
        wait_until(5_000, || {
            let registry = registry.clone();
            async move { registry.peer_count().await == 1 }
        })
        .await
    );

    let state = t.state.clone();
    let engine = t.engine.clone();
    t.stop().await;

    assert_eq!(*state.borrow(), ConnectionState::Disconnected);
    assert_eq!(registry.peer_count().await, 0);
    assert_eq!(registry.ports().leased_count(), 0);
    assert_eq!(engine.route_count(), 0);
}
