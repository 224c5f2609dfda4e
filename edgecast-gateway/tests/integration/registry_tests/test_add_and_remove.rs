use edgecast_core::{CameraDevice, PeerId, SourceSpec, StreamType};
use edgecast_gateway::{AddError, SessionState};

use crate::integration::{create_test_registry, init_tracing};

#[tokio::test]
async fn test_add_peer_leases_distinct_ports() {
    init_tracing();
    let t = create_test_registry(4);

    let first = t
        .registry
        .add_peer(PeerId::from("a"), SourceSpec::default())
        .await
        .expect("first add");
    let second = t
        .registry
        .add_peer(PeerId::from("b"), SourceSpec::parse("Thermal/sub"))
        .await
        .expect("second add");

    assert_eq!(first, 5000);
    assert_eq!(second, 5002);
    assert_eq!(t.registry.peer_count().await, 2);
    assert_eq!(t.engine.route_count(), 2);

    let info = t.registry.peer_info(&PeerId::from("b")).await.unwrap();
    assert_eq!(info.device, CameraDevice::Thermal);
    assert_eq!(info.stream_type, StreamType::Secondary);
    assert_eq!(info.state, SessionState::New);
    assert_eq!(info.port, 5002);
}

#[tokio::test]
async fn test_duplicate_join_is_rejected() {
    init_tracing();
    let t = create_test_registry(4);
    let peer_id = PeerId::from("dup");

    t.registry
        .add_peer(peer_id.clone(), SourceSpec::default())
        .await
        .unwrap();
    let result = t.registry.add_peer(peer_id.clone(), SourceSpec::default()).await;

    assert!(matches!(result, Err(AddError::Duplicate(id)) if id == peer_id));
    assert_eq!(t.registry.peer_count().await, 1);
    assert_eq!(t.registry.ports().leased_count(), 1);
    assert_eq!(t.engine.added(), 1);
}

#[tokio::test]
async fn test_capacity_limit() {
    init_tracing();
    let t = create_test_registry(2);

    for id in ["a", "b"] {
        t.registry
            .add_peer(PeerId::from(id), SourceSpec::default())
            .await
            .unwrap();
    }
    let result = t
        .registry
        .add_peer(PeerId::from("c"), SourceSpec::default())
        .await;

    assert!(matches!(result, Err(AddError::Capacity)));
    assert_eq!(t.registry.peer_count().await, 2);
    assert_eq!(t.engine.added(), 2);

    // a freed slot is usable again
    assert!(t.registry.remove_peer(&PeerId::from("a")).await);
    let port = t
        .registry
        .add_peer(PeerId::from("c"), SourceSpec::default())
        .await
        .unwrap();
    assert_eq!(port, 5000);
}

#[tokio::test]
async fn test_remove_peer_releases_everything() {
    init_tracing();
    let t = create_test_registry(4);
    let peer_id = PeerId::from("gone");

    let port = t
        .registry
        .add_peer(peer_id.clone(), SourceSpec::default())
        .await
        .unwrap();
    let route = t.engine.route(&peer_id).unwrap();

    assert!(t.registry.remove_peer(&peer_id).await);

    assert!(route.is_closed());
    assert!(!t.registry.ports().is_leased(port));
    assert_eq!(t.engine.route_count(), 0);
    assert!(t.registry.peer_info(&peer_id).await.is_none());

    // second removal is a no-op
    assert!(!t.registry.remove_peer(&peer_id).await);
    assert_eq!(t.engine.removed(), 1);
}

#[tokio::test]
async fn test_remove_all_clears_registry() {
    init_tracing();
    let t = create_test_registry(4);

    for id in ["a", "b", "c"] {
        t.registry
            .add_peer(PeerId::from(id), SourceSpec::default())
            .await
            .unwrap();
    }

    assert_eq!(t.registry.remove_all().await, 3);
    assert_eq!(t.registry.peer_count().await, 0);
    assert_eq!(t.registry.ports().leased_count(), 0);
    assert_eq!(t.registry.remove_all().await, 0);
}
