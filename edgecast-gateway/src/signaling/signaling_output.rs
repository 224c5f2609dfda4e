use async_trait::async_trait;
use edgecast_core::PeerId;

/// Outbound half of negotiation. Whatever carries signaling to the server
/// implements this so the registry can push descriptions and candidates to
/// a viewer without knowing about the wire.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    async fn send_offer(&self, peer_id: PeerId, sdp: String);

    async fn send_answer(&self, peer_id: PeerId, sdp: String);

    async fn send_ice(&self, peer_id: PeerId, candidate: String, mline_index: u16);
}
