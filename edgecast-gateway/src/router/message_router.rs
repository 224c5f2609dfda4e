use crate::error::NegotiationError;
use crate::registry::PeerRegistry;
use crate::router::CommandSink;
use edgecast_core::{SdpKind, SignalingCodec, SignalingMessage, SourceSpec};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What the router tells the supervisor about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterNotice {
    StatusAck,
}

/// One inbound text frame, tagged with the registry epoch it arrived in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub epoch: u64,
    pub text: String,
}

/// Turns inbound signaling text into registry operations.
///
/// Messages are handled strictly one after another, in arrival order.
pub struct MessageRouter {
    registry: Arc<PeerRegistry>,
    commands: Arc<dyn CommandSink>,
    notices: mpsc::UnboundedSender<RouterNotice>,
}

impl MessageRouter {
    pub fn new(
        registry: Arc<PeerRegistry>,
        commands: Arc<dyn CommandSink>,
        notices: mpsc::UnboundedSender<RouterNotice>,
    ) -> Self {
        Self {
            registry,
            commands,
            notices,
        }
    }

    pub async fn run(self, mut inbound: mpsc::Receiver<InboundFrame>, shutdown: CancellationToken) {
        info!("Message router started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                frame = inbound.recv() => match frame {
                    Some(frame) => self.dispatch_frame(frame).await,
                    None => break,
                },
            }
        }
        info!("Message router stopped");
    }

    /// Handle a frame from the current channel.
    pub async fn dispatch(&self, raw: &str) {
        self.handle(self.registry.epoch(), raw).await;
    }

    /// Handle a queued frame. Frames older than the last `remove_all` are
    /// dropped unread.
    pub async fn dispatch_frame(&self, frame: InboundFrame) {
        if frame.epoch != self.registry.epoch() {
            debug!("Discarding frame queued before the signaling channel dropped");
            return;
        }
        self.handle(frame.epoch, &frame.text).await;
    }

    async fn handle(&self, epoch: u64, raw: &str) {
        let message = match SignalingCodec::parse(raw) {
            Ok(message) => message,
            Err(e) if e.is_unknown_kind() => {
                debug!("Ignoring message: {e}");
                return;
            }
            Err(e) => {
                warn!("Dropping malformed message: {e}");
                return;
            }
        };

        match message {
            SignalingMessage::PeerJoined { peer_id, source } => {
                let source = SourceSpec::parse(&source);
                info!("Peer {peer_id} joined for {source}");
                let added = self
                    .registry
                    .add_peer_in_epoch(epoch, peer_id.clone(), source)
                    .await;
                if added.is_ok() {
                    let result = self.registry.create_offer(&peer_id).await;
                    log_negotiation("create offer", result);
                }
            }

            SignalingMessage::PeerLeft { peer_id } => {
                if !self.registry.remove_peer(&peer_id).await {
                    debug!("Peer {peer_id} left but was not registered");
                }
            }

            SignalingMessage::Answer { peer_id, sdp } => {
                let result = self
                    .registry
                    .set_remote_description(&peer_id, SdpKind::Answer, sdp)
                    .await;
                log_negotiation("apply answer", result);
            }

            SignalingMessage::Offer { peer_id, sdp } => {
                let result = self
                    .registry
                    .set_remote_description(&peer_id, SdpKind::Offer, sdp)
                    .await;
                log_negotiation("apply offer", result);
            }

            SignalingMessage::IceCandidate {
                peer_id,
                candidate,
                mline_index,
            } => {
                let result = self
                    .registry
                    .add_ice_candidate(&peer_id, candidate, mline_index)
                    .await;
                log_negotiation("add ICE candidate", result);
            }

            SignalingMessage::Command {
                peer_id,
                command,
                parameters,
            } => {
                self.commands
                    .handle_command(peer_id, command, parameters)
                    .await;
            }

            SignalingMessage::StatusAck => {
                let _ = self.notices.send(RouterNotice::StatusAck);
            }

            SignalingMessage::Register { .. } | SignalingMessage::CameraStatus { .. } => {
                debug!("Ignoring camera-originated message from server");
            }
        }
    }
}

fn log_negotiation(operation: &str, result: Result<(), NegotiationError>) {
    match result {
        Ok(()) => {}
        // candidates and answers routinely trail a viewer that already left
        Err(NegotiationError::UnknownPeer(peer_id)) => {
            debug!("Cannot {operation}: peer {peer_id} is not registered");
        }
        Err(e) => warn!("Cannot {operation}: {e}"),
    }
}
