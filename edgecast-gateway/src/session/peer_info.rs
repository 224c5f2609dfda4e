use crate::media::RouteStats;
use crate::session::SessionState;
use edgecast_core::{CameraDevice, PeerId, StreamType};
use serde::Serialize;

/// Point-in-time copy of a session, safe to hand out of the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerInfo {
    pub peer_id: PeerId,
    pub device: CameraDevice,
    pub stream_type: StreamType,
    pub state: SessionState,
    pub port: u16,
    /// Seconds since the Unix epoch at which the session reached `Connected`.
    pub connected_at: Option<u64>,
    pub stats: RouteStats,
}
