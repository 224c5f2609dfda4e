use super::create_test_router;
use crate::integration::init_tracing;

#[tokio::test]
async fn test_malformed_and_unknown_messages_are_dropped() {
    init_tracing();
    let mut t = create_test_router();

    for raw in [
        "not json",
        r#"{"message":{"peer_id":"x"}}"#,
        r#"{"action":"peer_joined","message":{}}"#,
        r#"{"action":"answer","message":{"peer_id":"x","sdp":""}}"#,
        r#"{"action":"firmware_update","message":{"url":"http://x"}}"#,
        r#"{"action":"register","message":{"name":"other","fw_version":"1","ai_version":"1"}}"#,
    ] {
        t.router.dispatch(raw).await;
    }

    assert_eq!(t.parts.registry.peer_count().await, 0);
    assert!(t.parts.signaling.signals().await.is_empty());
    assert!(t.commands.commands().await.is_empty());
    assert!(t.notices.try_recv().is_err());
}

#[tokio::test]
async fn test_negotiation_for_unknown_peer_is_ignored() {
    init_tracing();
    let t = create_test_router();

    t.router
        .dispatch(r#"{"action":"answer","message":{"peer_id":"ghost","sdp":"v=0"}}"#)
        .await;
    t.router
        .dispatch(
            r#"{"action":"candidate","message":{"peer_id":"ghost","ice":{"candidate":"c","sdpMLineIndex":0}}}"#,
        )
        .await;

    assert_eq!(t.parts.registry.peer_count().await, 0);
    assert_eq!(t.parts.engine.added(), 0);
}

#[tokio::test]
async fn test_failed_join_sends_nothing() {
    init_tracing();
    let t = create_test_router();
    t.parts.engine.fail_add(true);

    t.router
        .dispatch(r#"{"action":"peer_joined","message":{"peer_id":"x"}}"#)
        .await;

    assert_eq!(t.parts.registry.peer_count().await, 0);
    assert!(t.parts.signaling.signals().await.is_empty());
}
