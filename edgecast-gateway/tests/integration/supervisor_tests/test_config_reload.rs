use edgecast_gateway::{ConnectionState, GatewayConfig};

use super::start_gateway;
use crate::integration::init_tracing;
use crate::utils::{MockTransport, wait_until};

#[tokio::test(start_paused = true)]
async fn test_new_server_url_forces_reconnect() {
    init_tracing();
    let mut t = start_gateway(GatewayConfig::default(), MockTransport::new());
    assert!(t.wait_for_state(ConnectionState::Registered).await);

    let mut updated = GatewayConfig::default();
    updated.signaling.server_url = "ws://10.0.0.5:9000/".to_string();
    assert!(t.config.publish(updated));

    let transport = t.transport.clone();
    assert!(
        wait_until(10_000, || {
            let transport = transport.clone();
            async move { transport.connect_urls().len() == 2 }
        })
        .await
    );
    assert_eq!(
        t.transport.connect_urls()[1],
        "ws://10.0.0.5:9000/signaling/ai_cds/?token=test&peerType=camera"
    );
    assert!(t.wait_for_state(ConnectionState::Registered).await);

    t.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_unrelated_change_keeps_connection() {
    init_tracing();
    let mut t = start_gateway(GatewayConfig::default(), MockTransport::new());
    assert!(t.wait_for_state(ConnectionState::Registered).await);

    let mut updated = GatewayConfig::default();
    updated.heartbeat.interval_ms = 250;
    assert!(t.config.publish(updated.clone()));
    // publishing the same value again is not a change
    assert!(!t.config.publish(updated));

    let transport = t.transport.clone();
    assert!(
        wait_until(2_000, || {
            let transport = transport.clone();
            async move {
                transport
                    .sent_actions()
                    .iter()
                    .filter(|a| **a == "camstatus")
                    .count()
                    >= 4
            }
        })
        .await
    );
    assert_eq!(t.transport.connect_urls().len(), 1);

    t.stop().await;
}
