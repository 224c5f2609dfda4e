pub use edgecast_core::{PeerId, SignalingCodec, SignalingMessage, SourceSpec};

pub mod model {
    pub use edgecast_core::model::*;
}

pub mod codec {
    pub use edgecast_core::codec::*;
}

#[cfg(feature = "gateway")]
pub mod gateway {
    pub use edgecast_gateway::*;
}
