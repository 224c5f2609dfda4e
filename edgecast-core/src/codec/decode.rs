use crate::codec::parse_error::ParseError;
use crate::model::{CommandKind, PeerId, SignalingMessage};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Outer frame. `action` stays untyped so a non-string reads as missing.
#[derive(Deserialize)]
struct Envelope {
    action: Option<Value>,
    message: Option<Value>,
}

#[derive(Deserialize)]
struct RegisterBody {
    name: Option<String>,
    fw_version: Option<String>,
    ai_version: Option<String>,
}

#[derive(Deserialize)]
struct StatusBody {
    rec_status: Option<String>,
    rec_usage: Option<i64>,
    cpu_temp: Option<i64>,
    gpu_temp: Option<i64>,
    // thermal snapshot is absent on single-camera units
    rgb_snapshot: Option<String>,
    thermal_snapshot: Option<String>,
}

#[derive(Deserialize)]
struct PeerBody {
    peer_id: Option<String>,
    source: Option<String>,
}

#[derive(Deserialize)]
struct DescriptionBody {
    peer_id: Option<String>,
    sdp: Option<SdpField>,
}

/// SDP arrives either as `{"type": .., "sdp": ".."}` or as the bare text.
#[derive(Deserialize)]
#[serde(untagged)]
enum SdpField {
    Text(String),
    Description { sdp: String },
}

impl SdpField {
    fn into_text(self) -> String {
        match self {
            SdpField::Text(text) | SdpField::Description { sdp: text } => text,
        }
    }
}

#[derive(Deserialize)]
struct CandidateBody {
    peer_id: Option<String>,
    ice: Option<IceBody>,
}

#[derive(Deserialize)]
struct IceBody {
    candidate: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    mline_index: Option<i64>,
}

#[derive(Deserialize)]
struct CommandBody {
    peer_id: Option<String>,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

pub(super) fn decode(raw: &[u8]) -> Result<SignalingMessage, ParseError> {
    let envelope: Envelope =
        serde_json::from_slice(raw).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let action = envelope
        .action
        .as_ref()
        .and_then(Value::as_str)
        .ok_or(ParseError::MissingAction)?;
    let message = envelope.message;

    match action {
        "register" => decode_register(body(message, "register")?),
        "camstatus" => decode_camera_status(body(message, "camstatus")?),
        "peer_joined" | "ROOM_PEER_JOINED" => decode_peer_joined(body(message, "peer_joined")?),
        "peer_left" | "ROOM_PEER_LEFT" => decode_peer_left(body(message, "peer_left")?),
        "offer" => {
            let (peer_id, sdp) = description(body(message, "offer")?, "offer")?;
            Ok(SignalingMessage::Offer { peer_id, sdp })
        }
        "answer" => {
            let (peer_id, sdp) = description(body(message, "answer")?, "answer")?;
            Ok(SignalingMessage::Answer { peer_id, sdp })
        }
        "candidate" => decode_candidate(body(message, "candidate")?),
        "command" | "send_camera" => decode_command(body(message, "command")?),
        "camstatus_reply" | "registered" => Ok(SignalingMessage::StatusAck),
        other => Err(ParseError::UnknownKind(other.to_owned())),
    }
}

fn body<T: DeserializeOwned>(message: Option<Value>, kind: &'static str) -> Result<T, ParseError> {
    match message {
        Some(value @ Value::Object(_)) => {
            serde_json::from_value(value).map_err(|e| ParseError::InvalidField {
                kind,
                field: "message",
                reason: e.to_string(),
            })
        }
        Some(_) => Err(ParseError::InvalidField {
            kind,
            field: "message",
            reason: "expected an object".to_owned(),
        }),
        None => Err(ParseError::MissingField {
            kind,
            field: "message",
        }),
    }
}

fn decode_register(msg: RegisterBody) -> Result<SignalingMessage, ParseError> {
    const KIND: &str = "register";

    Ok(SignalingMessage::Register {
        camera_id: non_empty(msg.name, KIND, "name")?,
        firmware_version: required(msg.fw_version, KIND, "fw_version")?,
        ai_version: required(msg.ai_version, KIND, "ai_version")?,
    })
}

fn decode_camera_status(msg: StatusBody) -> Result<SignalingMessage, ParseError> {
    const KIND: &str = "camstatus";

    Ok(SignalingMessage::CameraStatus {
        record_status: required(msg.rec_status, KIND, "rec_status")?,
        record_usage: ranged(msg.rec_usage, KIND, "rec_usage")?,
        cpu_temp: ranged(msg.cpu_temp, KIND, "cpu_temp")?,
        gpu_temp: ranged(msg.gpu_temp, KIND, "gpu_temp")?,
        rgb_snapshot: msg.rgb_snapshot.unwrap_or_default(),
        thermal_snapshot: msg.thermal_snapshot.unwrap_or_default(),
    })
}

fn decode_peer_joined(msg: PeerBody) -> Result<SignalingMessage, ParseError> {
    let peer_id = peer_id(msg.peer_id, "peer_joined")?;
    let source = msg
        .source
        .filter(|source| !source.is_empty())
        .unwrap_or_else(|| "RGB".to_owned());

    Ok(SignalingMessage::PeerJoined { peer_id, source })
}

fn decode_peer_left(msg: PeerBody) -> Result<SignalingMessage, ParseError> {
    Ok(SignalingMessage::PeerLeft {
        peer_id: peer_id(msg.peer_id, "peer_left")?,
    })
}

fn description(
    msg: DescriptionBody,
    kind: &'static str,
) -> Result<(PeerId, String), ParseError> {
    let peer_id = peer_id(msg.peer_id, kind)?;
    let sdp = required(msg.sdp, kind, "sdp")?.into_text();
    if sdp.is_empty() {
        return Err(empty(kind, "sdp"));
    }
    Ok((peer_id, sdp))
}

fn decode_candidate(msg: CandidateBody) -> Result<SignalingMessage, ParseError> {
    const KIND: &str = "candidate";

    let peer_id = peer_id(msg.peer_id, KIND)?;
    let ice = required(msg.ice, KIND, "ice")?;

    Ok(SignalingMessage::IceCandidate {
        peer_id,
        candidate: non_empty(ice.candidate, KIND, "candidate")?,
        mline_index: ranged(ice.mline_index, KIND, "sdpMLineIndex")?,
    })
}

fn decode_command(mut msg: CommandBody) -> Result<SignalingMessage, ParseError> {
    const KIND: &str = "command";

    let peer_id = peer_id(msg.peer_id, KIND)?;

    CommandKind::ALL
        .iter()
        .find_map(|command| {
            msg.payload
                .remove(command.key())
                .map(|parameters| (*command, parameters))
        })
        .map(|(command, parameters)| SignalingMessage::Command {
            peer_id,
            command,
            parameters,
        })
        .ok_or(ParseError::MissingField {
            kind: KIND,
            field: "ptz|record|custom_command",
        })
}

fn peer_id(value: Option<String>, kind: &'static str) -> Result<PeerId, ParseError> {
    non_empty(value, kind, "peer_id").map(PeerId::from)
}

fn required<T>(value: Option<T>, kind: &'static str, field: &'static str) -> Result<T, ParseError> {
    value.ok_or(ParseError::MissingField { kind, field })
}

fn non_empty(
    value: Option<String>,
    kind: &'static str,
    field: &'static str,
) -> Result<String, ParseError> {
    let value = required(value, kind, field)?;
    if value.is_empty() {
        return Err(empty(kind, field));
    }
    Ok(value)
}

fn ranged<T>(value: Option<i64>, kind: &'static str, field: &'static str) -> Result<T, ParseError>
where
    T: TryFrom<i64>,
{
    let number = required(value, kind, field)?;
    T::try_from(number).map_err(|_| ParseError::InvalidField {
        kind,
        field,
        reason: format!("{number} is out of range"),
    })
}

fn empty(kind: &'static str, field: &'static str) -> ParseError {
    ParseError::InvalidField {
        kind,
        field,
        reason: "empty".to_owned(),
    }
}
