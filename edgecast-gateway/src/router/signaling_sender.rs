use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use edgecast_core::{PeerId, SignalingCodec, SignalingMessage};
use tokio::sync::mpsc;
use tracing::debug;

/// Serializes outbound messages into the queue the supervisor drains onto
/// the transport.
#[derive(Clone)]
pub struct SignalingSender {
    outbound: mpsc::UnboundedSender<String>,
}

impl SignalingSender {
    pub fn new(outbound: mpsc::UnboundedSender<String>) -> Self {
        Self { outbound }
    }

    /// Queue `message`. Returns `false` once the supervisor is gone.
    pub fn send_message(&self, message: &SignalingMessage) -> bool {
        let text = SignalingCodec::serialize(message);
        if self.outbound.send(text).is_err() {
            debug!("Outbound queue closed, dropping {}", message.action());
            return false;
        }
        true
    }
}

#[async_trait]
impl SignalingOutput for SignalingSender {
    async fn send_offer(&self, peer_id: PeerId, sdp: String) {
        self.send_message(&SignalingMessage::Offer { peer_id, sdp });
    }

    async fn send_answer(&self, peer_id: PeerId, sdp: String) {
        self.send_message(&SignalingMessage::Answer { peer_id, sdp });
    }

    async fn send_ice(&self, peer_id: PeerId, candidate: String, mline_index: u16) {
        self.send_message(&SignalingMessage::IceCandidate {
            peer_id,
            candidate,
            mline_index,
        });
    }
}
