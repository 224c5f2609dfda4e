mod peer;
mod signaling;
mod source;

pub use peer::PeerId;
pub use signaling::{CommandKind, SdpKind, SignalingMessage};
pub use source::{CameraDevice, SourceSpec, StreamType};
