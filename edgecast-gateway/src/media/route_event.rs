use crate::media::RouteId;
use serde::Serialize;

/// Connectivity as reported by the engine for a single route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteState {
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouteStats {
    pub bytes_sent: u64,
    pub packets_sent: u64,
    pub bytes_received: u64,
    pub packets_received: u64,
}

/// Something a route reported from the engine side.
#[derive(Debug, Clone)]
pub struct RouteEvent {
    pub route: RouteId,
    pub kind: RouteEventKind,
}

#[derive(Debug, Clone)]
pub enum RouteEventKind {
    /// Locally gathered candidate that has to reach the viewer.
    IceCandidate { candidate: String, mline_index: u16 },

    StateChanged(RouteState),

    Stats(RouteStats),

    /// The route broke and cannot carry media any more.
    Failed(String),
}

impl RouteEvent {
    pub fn new(route: RouteId, kind: RouteEventKind) -> Self {
        Self { route, kind }
    }
}
