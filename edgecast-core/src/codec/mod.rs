//! JSON envelope codec for the signaling channel.
//!
//! Every frame has the shape `{"action": .., "peerType": .., "message": {..}}`.
//! The codec is stateless; share it freely between tasks.

mod decode;
mod encode;
mod parse_error;

pub use parse_error::ParseError;

use crate::model::SignalingMessage;

pub struct SignalingCodec;

impl SignalingCodec {
    /// Decode one inbound frame.
    pub fn parse(raw: impl AsRef<[u8]>) -> Result<SignalingMessage, ParseError> {
        decode::decode(raw.as_ref())
    }

    /// Encode a message into its wire text.
    pub fn serialize(message: &SignalingMessage) -> String {
        encode::encode(message).to_string()
    }
}
