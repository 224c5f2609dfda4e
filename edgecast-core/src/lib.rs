pub mod codec;
pub mod model;

pub use codec::{ParseError, SignalingCodec};
pub use model::*;
