use crate::error::NegotiationError;
use crate::media::{MediaRoute, RouteId, RouteStats};
use crate::session::{PeerInfo, SessionState};
use edgecast_core::{PeerId, SdpKind, SourceSpec};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Outbound notifications a session produces as negotiation progresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    OfferCreated(String),
    AnswerCreated(String),
    LocalCandidate {
        candidate: String,
        mline_index: u16,
    },
    Error(String),
}

/// State machine for one viewer attachment.
///
/// The session itself never awaits. Async work is split in two halves: a
/// `begin_*` call validates the transition and hands out the route, and the
/// matching completion call applies the result once the route answered. The
/// registry runs the await in between with its lock released.
pub struct PeerSession {
    route_id: RouteId,
    source: SourceSpec,
    port: u16,
    state: SessionState,
    connected_at: Option<SystemTime>,
    local_description: Option<String>,
    local_sent: bool,
    local_candidates: Vec<(String, u16)>,
    last_stats: Option<RouteStats>,
    route: Option<Arc<dyn MediaRoute>>,
}

impl PeerSession {
    pub fn new(
        route_id: RouteId,
        source: SourceSpec,
        port: u16,
        route: Arc<dyn MediaRoute>,
    ) -> Self {
        Self {
            route_id,
            source,
            port,
            state: SessionState::New,
            connected_at: None,
            local_description: None,
            local_sent: false,
            local_candidates: Vec::new(),
            last_stats: None,
            route: Some(route),
        }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.route_id.peer_id
    }

    pub fn route_id(&self) -> &RouteId {
        &self.route_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn source(&self) -> SourceSpec {
        self.source
    }

    pub fn local_description(&self) -> Option<&str> {
        self.local_description.as_deref()
    }

    pub fn begin_offer(&mut self) -> Result<Arc<dyn MediaRoute>, NegotiationError> {
        self.begin("create_offer")
    }

    pub fn offer_created(&mut self, sdp: String) -> SessionEvent {
        debug!("Peer {}: local offer ready", self.peer_id());
        self.local_description = Some(sdp.clone());
        SessionEvent::OfferCreated(sdp)
    }

    pub fn begin_remote_description(
        &mut self,
        kind: SdpKind,
    ) -> Result<Arc<dyn MediaRoute>, NegotiationError> {
        match kind {
            SdpKind::Offer => self.begin("apply remote offer"),
            SdpKind::Answer => self.begin("apply remote answer"),
        }
    }

    /// Record an applied remote description.
    ///
    /// An answer completes negotiation. An offer yields our answer, but the
    /// session keeps `Connecting` until the route reports connectivity.
    pub fn remote_description_applied(
        &mut self,
        kind: SdpKind,
        local_answer: Option<String>,
    ) -> Option<SessionEvent> {
        match kind {
            SdpKind::Answer => {
                self.mark_connected();
                None
            }
            SdpKind::Offer => {
                let answer = local_answer?;
                self.local_description = Some(answer.clone());
                Some(SessionEvent::AnswerCreated(answer))
            }
        }
    }

    /// A candidate gathered by our route. Candidates are held until the local
    /// description has been sent, so the viewer never sees one ahead of the
    /// offer or answer.
    pub fn local_candidate(&mut self, candidate: String, mline_index: u16) -> Option<SessionEvent> {
        if self.local_sent {
            return Some(SessionEvent::LocalCandidate {
                candidate,
                mline_index,
            });
        }
        self.local_candidates.push((candidate, mline_index));
        None
    }

    /// The local description went out. Returns the held candidates in the
    /// order they were gathered.
    pub fn local_description_sent(&mut self) -> Vec<SessionEvent> {
        self.local_sent = true;
        self.local_candidates
            .drain(..)
            .map(|(candidate, mline_index)| SessionEvent::LocalCandidate {
                candidate,
                mline_index,
            })
            .collect()
    }

    /// Route to hand a remote candidate to, or `None` when the candidate is
    /// late and should be dropped.
    pub fn ice_route(&self) -> Result<Option<Arc<dyn MediaRoute>>, NegotiationError> {
        match self.state {
            SessionState::Connecting | SessionState::Connected => {
                self.route("add_ice_candidate").map(Some)
            }
            SessionState::Failed | SessionState::Closed => {
                debug!(
                    "Peer {}: ignoring ICE candidate in state {}",
                    self.peer_id(),
                    self.state
                );
                Ok(None)
            }
            SessionState::New => {
                warn!(
                    "Peer {}: ICE candidate before negotiation started",
                    self.peer_id()
                );
                Err(self.invalid_state("add_ice_candidate"))
            }
        }
    }

    /// The route confirmed connectivity.
    pub fn on_transport_connected(&mut self) -> bool {
        if self.state != SessionState::Connecting {
            return false;
        }
        self.mark_connected();
        true
    }

    pub fn on_error(&mut self, reason: &str) -> Option<SessionEvent> {
        if self.state.is_finished() {
            return None;
        }
        warn!("Peer {} failed: {reason}", self.peer_id());
        self.state = SessionState::Failed;
        Some(SessionEvent::Error(reason.to_owned()))
    }

    pub fn record_stats(&mut self, stats: RouteStats) {
        self.last_stats = Some(stats);
    }

    /// Last reported counters. Reads the route directly only until the
    /// first report arrives.
    pub fn stats(&self) -> RouteStats {
        match (self.last_stats, &self.route) {
            (Some(stats), _) => stats,
            (None, Some(route)) => route.stats(),
            (None, None) => RouteStats::default(),
        }
    }

    /// Move to `Closed` and give up the route handle. The caller closes the
    /// route. Calling again returns `None`.
    pub fn disconnect(&mut self) -> Option<Arc<dyn MediaRoute>> {
        if self.state == SessionState::Closed {
            return None;
        }
        if let Some(route) = &self.route {
            self.last_stats = Some(route.stats());
        }
        self.state = SessionState::Closed;
        self.route.take()
    }

    pub fn info(&self) -> PeerInfo {
        PeerInfo {
            peer_id: self.peer_id().clone(),
            device: self.source.device,
            stream_type: self.source.stream_type,
            state: self.state,
            port: self.port,
            connected_at: self
                .connected_at
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs()),
            stats: self.stats(),
        }
    }

    fn begin(&mut self, operation: &'static str) -> Result<Arc<dyn MediaRoute>, NegotiationError> {
        match self.state {
            SessionState::New | SessionState::Connecting => {
                let route = self.route(operation)?;
                self.state = SessionState::Connecting;
                Ok(route)
            }
            _ => Err(self.invalid_state(operation)),
        }
    }

    fn route(&self, operation: &'static str) -> Result<Arc<dyn MediaRoute>, NegotiationError> {
        self.route
            .clone()
            .ok_or_else(|| self.invalid_state(operation))
    }

    fn mark_connected(&mut self) {
        self.state = SessionState::Connected;
        self.connected_at = Some(SystemTime::now());
        info!("Peer {} connected on port {}", self.peer_id(), self.port);
    }

    fn invalid_state(&self, operation: &'static str) -> NegotiationError {
        NegotiationError::InvalidState {
            peer_id: self.peer_id().clone(),
            state: self.state,
            operation,
        }
    }
}
