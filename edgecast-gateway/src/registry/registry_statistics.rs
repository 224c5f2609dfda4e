use crate::session::{PeerInfo, SessionState};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RegistryStatistics {
    pub total_peers: usize,
    pub connected_peers: usize,
    /// Bytes sent, summed over connected peers.
    pub bytes_sent: u64,
    /// `bytes_sent * 8 / (connected_peers * 1e6)`. Not smoothed.
    pub bitrate_mbps: f64,
}

impl RegistryStatistics {
    pub fn from_peers(peers: &[PeerInfo]) -> Self {
        let connected: Vec<&PeerInfo> = peers
            .iter()
            .filter(|p| p.state == SessionState::Connected)
            .collect();

        let bytes_sent: u64 = connected.iter().map(|p| p.stats.bytes_sent).sum();
        let bitrate_mbps = if connected.is_empty() {
            0.0
        } else {
            (bytes_sent as f64 * 8.0) / (connected.len() as f64 * 1e6)
        };

        Self {
            total_peers: peers.len(),
            connected_peers: connected.len(),
            bytes_sent,
            bitrate_mbps,
        }
    }
}
