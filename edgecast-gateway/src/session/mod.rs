mod peer_info;
mod peer_session;
mod session_state;

pub use peer_info::PeerInfo;
pub use peer_session::{PeerSession, SessionEvent};
pub use session_state::SessionState;
