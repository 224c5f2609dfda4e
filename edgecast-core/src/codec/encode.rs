use crate::model::{SdpKind, SignalingMessage};
use serde_json::{Value, json};

pub(super) fn encode(message: &SignalingMessage) -> Value {
    let (peer_type, body) = match message {
        SignalingMessage::Register {
            camera_id,
            firmware_version,
            ai_version,
        } => (
            "camera",
            json!({
                "name": camera_id,
                "fw_version": firmware_version,
                "ai_version": ai_version,
            }),
        ),

        SignalingMessage::CameraStatus {
            record_status,
            record_usage,
            cpu_temp,
            gpu_temp,
            rgb_snapshot,
            thermal_snapshot,
        } => (
            "camera",
            json!({
                "rec_status": record_status,
                "rec_usage": record_usage,
                "cpu_temp": cpu_temp,
                "gpu_temp": gpu_temp,
                "rgb_snapshot": rgb_snapshot,
                "thermal_snapshot": thermal_snapshot,
            }),
        ),

        SignalingMessage::PeerJoined { peer_id, source } => (
            "client",
            json!({
                "peer_id": peer_id,
                "source": source,
            }),
        ),

        SignalingMessage::PeerLeft { peer_id } => ("client", json!({ "peer_id": peer_id })),

        SignalingMessage::Offer { peer_id, sdp } => (
            "camera",
            json!({
                "peer_id": peer_id,
                "sdp": description(SdpKind::Offer, sdp),
            }),
        ),

        SignalingMessage::Answer { peer_id, sdp } => (
            "camera",
            json!({
                "peer_id": peer_id,
                "sdp": description(SdpKind::Answer, sdp),
            }),
        ),

        SignalingMessage::IceCandidate {
            peer_id,
            candidate,
            mline_index,
        } => (
            "camera",
            json!({
                "peer_id": peer_id,
                "ice": {
                    "candidate": candidate,
                    "sdpMLineIndex": mline_index,
                },
            }),
        ),

        SignalingMessage::Command {
            peer_id,
            command,
            parameters,
        } => {
            let mut body = json!({ "peer_id": peer_id });
            body[command.key()] = parameters.clone();
            ("controller", body)
        }

        SignalingMessage::StatusAck => ("server", json!({})),
    };

    json!({
        "action": message.action(),
        "peerType": peer_type,
        "message": body,
    })
}

fn description(kind: SdpKind, sdp: &str) -> Value {
    json!({
        "type": kind.as_str(),
        "sdp": sdp,
    })
}
