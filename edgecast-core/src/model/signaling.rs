use crate::model::peer::PeerId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Every message exchanged with the signaling server.
///
/// The set is closed: the codec either produces one complete variant or an
/// error, and dispatchers are expected to `match` exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalingMessage {
    /// Camera announces itself after the channel opens.
    Register {
        camera_id: String,
        firmware_version: String,
        ai_version: String,
    },

    /// Periodic status/keepalive pushed by the camera.
    CameraStatus {
        record_status: String,
        record_usage: u32,
        cpu_temp: i32,
        gpu_temp: i32,
        rgb_snapshot: String,
        thermal_snapshot: String,
    },

    /// A viewer wants a feed.
    PeerJoined { peer_id: PeerId, source: String },

    /// A viewer went away.
    PeerLeft { peer_id: PeerId },

    Offer { peer_id: PeerId, sdp: String },

    Answer { peer_id: PeerId, sdp: String },

    IceCandidate {
        peer_id: PeerId,
        candidate: String,
        mline_index: u16,
    },

    /// Control request relayed from a viewer.
    Command {
        peer_id: PeerId,
        command: CommandKind,
        parameters: Value,
    },

    /// Server acknowledgement of registration or of a status push.
    StatusAck,
}

impl SignalingMessage {
    /// Wire `action` the message is serialized under.
    pub fn action(&self) -> &'static str {
        match self {
            SignalingMessage::Register { .. } => "register",
            SignalingMessage::CameraStatus { .. } => "camstatus",
            SignalingMessage::PeerJoined { .. } => "peer_joined",
            SignalingMessage::PeerLeft { .. } => "peer_left",
            SignalingMessage::Offer { .. } => "offer",
            SignalingMessage::Answer { .. } => "answer",
            SignalingMessage::IceCandidate { .. } => "candidate",
            SignalingMessage::Command { .. } => "command",
            SignalingMessage::StatusAck => "camstatus_reply",
        }
    }
}

/// Which side of the offer/answer exchange a description belongs to.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

impl SdpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SdpKind::Offer => "offer",
            SdpKind::Answer => "answer",
        }
    }
}

impl fmt::Display for SdpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command payloads a viewer may send; the name doubles as the JSON key.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq)]
pub enum CommandKind {
    Ptz,
    Record,
    Custom,
}

impl CommandKind {
    pub const ALL: [CommandKind; 3] = [CommandKind::Ptz, CommandKind::Record, CommandKind::Custom];

    pub fn key(&self) -> &'static str {
        match self {
            CommandKind::Ptz => "ptz",
            CommandKind::Record => "record",
            CommandKind::Custom => "custom_command",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
