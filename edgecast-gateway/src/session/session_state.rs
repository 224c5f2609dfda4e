use serde::Serialize;
use std::fmt;

/// Negotiation/connectivity state of one viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    New,
    Connecting,
    Connected,
    Failed,
    Closed,
}

impl SessionState {
    /// `Failed` and `Closed` accept no further negotiation.
    pub fn is_finished(self) -> bool {
        matches!(self, SessionState::Failed | SessionState::Closed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::New => "new",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Failed => "failed",
            SessionState::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
