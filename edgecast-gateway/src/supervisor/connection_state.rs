use serde::Serialize;
use std::fmt;

/// Lifecycle of the signaling connection.
///
/// `Disconnected → Connecting → Connected → Registering → Registered → Running`.
/// Losing the transport always goes back to `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Registering,
    Registered,
    Running,
    Error,
}

impl ConnectionState {
    /// Registration went out; status heartbeats are due.
    pub fn is_registered(self) -> bool {
        matches!(self, ConnectionState::Registered | ConnectionState::Running)
    }

    /// No live channel; the heartbeat should try to reconnect.
    pub fn wants_connection(self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Connecting | ConnectionState::Error
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
