use crate::error::{AddError, MediaError, NegotiationError};
use crate::media::{
    MediaEngine, MediaRoute, RouteEvent, RouteEventKind, RouteId, RouteSpec, RouteState,
};
use crate::ports::PortAllocator;
use crate::registry::RegistryStatistics;
use crate::registry::pending_ticket::PendingTicket;
use crate::session::{PeerInfo, PeerSession, SessionEvent};
use crate::signaling::SignalingOutput;
use edgecast_core::{PeerId, SdpKind, SourceSpec};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const ROUTE_EVENT_BUFFER: usize = 256;

#[derive(Default)]
struct RegistryState {
    peers: HashMap<PeerId, PeerSession>,
    pending: HashMap<PeerId, PendingTicket>,
}

impl RegistryState {
    /// The session `route` belongs to, if that incarnation is still live.
    fn current(&mut self, route: &RouteId) -> Option<&mut PeerSession> {
        self.peers
            .get_mut(&route.peer_id)
            .filter(|s| s.route_id() == route)
    }

    fn take_current(&mut self, route: &RouteId) -> Option<PeerSession> {
        self.current(route)?;
        self.peers.remove(&route.peer_id)
    }
}

/// Owns every viewer session.
///
/// All map mutation happens under `state`. The lock is never held while the
/// media engine or the signaling output is awaited: operations take what
/// they need, release the lock, await, then re-check that the session they
/// started with is still the live one before applying anything.
pub struct PeerRegistry {
    state: Mutex<RegistryState>,
    ports: PortAllocator,
    engine: Arc<dyn MediaEngine>,
    signaling: Arc<dyn SignalingOutput>,
    events_tx: mpsc::Sender<RouteEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<RouteEvent>>>,
    next_generation: AtomicU64,
    epoch: AtomicU64,
}

impl PeerRegistry {
    pub fn new(
        ports: PortAllocator,
        engine: Arc<dyn MediaEngine>,
        signaling: Arc<dyn SignalingOutput>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(ROUTE_EVENT_BUFFER);

        Self {
            state: Mutex::new(RegistryState::default()),
            ports,
            engine,
            signaling,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            next_generation: AtomicU64::new(1),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn ports(&self) -> &PortAllocator {
        &self.ports
    }

    /// Bumped by every [`remove_all`](Self::remove_all).
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Attach a viewer: lease a port, open a route, create the session.
    ///
    /// Either all of that happens or none of it does. Returns the leased port.
    pub async fn add_peer(&self, peer_id: PeerId, source: SourceSpec) -> Result<u16, AddError> {
        self.admit(peer_id, source, None).await
    }

    /// [`add_peer`](Self::add_peer) for a join observed during `epoch`. The
    /// join is refused as cancelled once a `remove_all` has moved past it.
    pub async fn add_peer_in_epoch(
        &self,
        epoch: u64,
        peer_id: PeerId,
        source: SourceSpec,
    ) -> Result<u16, AddError> {
        self.admit(peer_id, source, Some(epoch)).await
    }

    async fn admit(
        &self,
        peer_id: PeerId,
        source: SourceSpec,
        epoch: Option<u64>,
    ) -> Result<u16, AddError> {
        {
            let mut state = self.state.lock().await;
            if epoch.is_some_and(|epoch| epoch != self.epoch()) {
                info!("Ignoring join for peer {peer_id} from a dropped signaling channel");
                return Err(AddError::Cancelled(peer_id));
            }
            if state.peers.contains_key(&peer_id) || state.pending.contains_key(&peer_id) {
                warn!("Rejecting duplicate join for peer {peer_id}");
                return Err(AddError::Duplicate(peer_id));
            }
            state.pending.insert(peer_id.clone(), PendingTicket::new());
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let route_id = RouteId {
            peer_id: peer_id.clone(),
            generation,
        };
        let opened = self.open_route(&route_id, source).await;

        let mut state = self.state.lock().await;
        // Only this call removes the ticket, so it is still ours.
        let cancelled = state
            .pending
            .remove(&peer_id)
            .is_none_or(|ticket| ticket.is_cancelled());

        let (port, route) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                warn!("Failed to add peer {peer_id}: {e}");
                return Err(e);
            }
        };

        if cancelled {
            drop(state);
            info!("Peer {peer_id} left before its route was ready");
            self.close_route(&route_id, route, port).await;
            return Err(AddError::Cancelled(peer_id));
        }

        let session = PeerSession::new(route_id, source, port, route);
        state.peers.insert(peer_id.clone(), session);
        info!(
            "Peer {peer_id} added ({source}, port {port}), {} active",
            state.peers.len()
        );

        Ok(port)
    }

    /// Detach a viewer. Returns `false` if it was not registered.
    ///
    /// An add still in flight for the same id is cancelled as well.
    pub async fn remove_peer(&self, peer_id: &PeerId) -> bool {
        let session = {
            let mut state = self.state.lock().await;
            if let Some(ticket) = state.pending.get_mut(peer_id) {
                ticket.cancel();
            }
            state.peers.remove(peer_id)
        };

        match session {
            Some(session) => {
                self.teardown(session).await;
                info!("Peer {peer_id} removed");
                true
            }
            None => false,
        }
    }

    /// Detach every viewer and cancel pending adds. Returns how many sessions
    /// were removed.
    pub async fn remove_all(&self) -> usize {
        let ids: Vec<PeerId> = {
            let mut state = self.state.lock().await;
            self.epoch.fetch_add(1, Ordering::SeqCst);
            for ticket in state.pending.values_mut() {
                ticket.cancel();
            }
            state.peers.keys().cloned().collect()
        };

        let mut removed = 0;
        for peer_id in &ids {
            if self.remove_peer(peer_id).await {
                removed += 1;
            }
        }

        if removed > 0 {
            info!("Removed all {removed} peers");
        }
        removed
    }

    pub async fn create_offer(&self, peer_id: &PeerId) -> Result<(), NegotiationError> {
        let (route_id, route) = {
            let mut state = self.state.lock().await;
            let session = state
                .peers
                .get_mut(peer_id)
                .ok_or_else(|| NegotiationError::UnknownPeer(peer_id.clone()))?;
            (session.route_id().clone(), session.begin_offer()?)
        };

        let sdp = match route.create_offer().await {
            Ok(sdp) => sdp,
            Err(e) => return Err(self.fail(&route_id, e).await),
        };

        let event = {
            let mut state = self.state.lock().await;
            match state.current(&route_id) {
                Some(session) => session.offer_created(sdp),
                None => {
                    debug!("Dropping offer for departed peer {peer_id}");
                    return Ok(());
                }
            }
        };

        self.emit(peer_id, event).await;
        self.flush_local_candidates(&route_id).await;
        Ok(())
    }

    pub async fn set_remote_description(
        &self,
        peer_id: &PeerId,
        kind: SdpKind,
        sdp: String,
    ) -> Result<(), NegotiationError> {
        let (route_id, route) = {
            let mut state = self.state.lock().await;
            let session = state
                .peers
                .get_mut(peer_id)
                .ok_or_else(|| NegotiationError::UnknownPeer(peer_id.clone()))?;
            (
                session.route_id().clone(),
                session.begin_remote_description(kind)?,
            )
        };

        let answer = match route.set_remote_description(kind, sdp).await {
            Ok(None) if kind == SdpKind::Offer => {
                let e = MediaError::Negotiation("no answer produced for remote offer".to_owned());
                return Err(self.fail(&route_id, e).await);
            }
            Ok(answer) => answer,
            Err(e) => return Err(self.fail(&route_id, e).await),
        };

        let event = {
            let mut state = self.state.lock().await;
            match state.current(&route_id) {
                Some(session) => session.remote_description_applied(kind, answer),
                None => {
                    debug!("Dropping remote {kind} for departed peer {peer_id}");
                    return Ok(());
                }
            }
        };

        if let Some(event) = event {
            self.emit(peer_id, event).await;
            self.flush_local_candidates(&route_id).await;
        }
        Ok(())
    }

    pub async fn add_ice_candidate(
        &self,
        peer_id: &PeerId,
        candidate: String,
        mline_index: u16,
    ) -> Result<(), NegotiationError> {
        let (route_id, route) = {
            let state = self.state.lock().await;
            let session = state
                .peers
                .get(peer_id)
                .ok_or_else(|| NegotiationError::UnknownPeer(peer_id.clone()))?;
            match session.ice_route()? {
                Some(route) => (session.route_id().clone(), route),
                None => return Ok(()),
            }
        };

        if let Err(e) = route.add_ice_candidate(candidate, mline_index).await {
            return Err(self.fail(&route_id, e).await);
        }
        Ok(())
    }

    /// Consume route events until `shutdown` fires. Call once.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let Some(mut events) = self.events_rx.lock().await.take() else {
            warn!("Registry event pump is already running");
            return;
        };

        info!("Registry event pump started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle_route_event(event).await,
                    None => break,
                },
            }
        }
        info!("Registry event pump stopped");
    }

    pub async fn peer_info(&self, peer_id: &PeerId) -> Option<PeerInfo> {
        self.state.lock().await.peers.get(peer_id).map(PeerSession::info)
    }

    pub async fn all_peers(&self) -> Vec<PeerInfo> {
        let mut peers: Vec<PeerInfo> = self
            .state
            .lock()
            .await
            .peers
            .values()
            .map(PeerSession::info)
            .collect();
        peers.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        peers
    }

    pub async fn peer_count(&self) -> usize {
        self.state.lock().await.peers.len()
    }

    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn statistics(&self) -> RegistryStatistics {
        RegistryStatistics::from_peers(&self.all_peers().await)
    }

    async fn handle_route_event(&self, event: RouteEvent) {
        let RouteEvent { route, kind } = event;

        match kind {
            RouteEventKind::IceCandidate {
                candidate,
                mline_index,
            } => {
                let event = {
                    let mut state = self.state.lock().await;
                    match state.current(&route).filter(|s| !s.state().is_finished()) {
                        Some(session) => session.local_candidate(candidate, mline_index),
                        None => {
                            debug!("Dropping local candidate for stale route {route}");
                            None
                        }
                    }
                };
                if let Some(event) = event {
                    self.emit(&route.peer_id, event).await;
                }
            }

            RouteEventKind::StateChanged(RouteState::Connected) => {
                let mut state = self.state.lock().await;
                if let Some(session) = state.current(&route) {
                    session.on_transport_connected();
                }
            }

            RouteEventKind::StateChanged(RouteState::Failed) => {
                let reason = MediaError::Negotiation("peer connection failed".to_owned());
                self.fail(&route, reason).await;
            }

            RouteEventKind::Failed(reason) => {
                self.fail(&route, MediaError::Setup(reason)).await;
            }

            RouteEventKind::StateChanged(RouteState::Closed) => {
                let session = self.state.lock().await.take_current(&route);
                if let Some(session) = session {
                    info!("Route {route} closed by remote side");
                    self.teardown(session).await;
                }
            }

            RouteEventKind::StateChanged(state) => {
                debug!("Route {route} is {state:?}");
            }

            RouteEventKind::Stats(stats) => {
                let mut state = self.state.lock().await;
                if let Some(session) = state.current(&route) {
                    session.record_stats(stats);
                }
            }
        }
    }

    /// Mark the session failed and remove it. Sessions never retry on their
    /// own; a fresh join brings the viewer back.
    async fn fail(&self, route: &RouteId, error: MediaError) -> NegotiationError {
        let session = {
            let mut state = self.state.lock().await;
            let event = state
                .current(route)
                .and_then(|s| s.on_error(&error.to_string()));
            event.and_then(|_| state.take_current(route))
        };

        if let Some(session) = session {
            self.teardown(session).await;
            info!("Removed failed peer {}", route.peer_id);
        }

        error.into()
    }

    async fn emit(&self, peer_id: &PeerId, event: SessionEvent) {
        match event {
            SessionEvent::OfferCreated(sdp) => self.signaling.send_offer(peer_id.clone(), sdp).await,
            SessionEvent::AnswerCreated(sdp) => {
                self.signaling.send_answer(peer_id.clone(), sdp).await
            }
            SessionEvent::LocalCandidate {
                candidate,
                mline_index,
            } => {
                self.signaling
                    .send_ice(peer_id.clone(), candidate, mline_index)
                    .await
            }
            SessionEvent::Error(reason) => warn!("Peer {peer_id}: {reason}"),
        }
    }

    /// Send candidates the route gathered while its description was in flight.
    async fn flush_local_candidates(&self, route_id: &RouteId) {
        let held = match self.state.lock().await.current(route_id) {
            Some(session) => session.local_description_sent(),
            None => return,
        };
        for event in held {
            self.emit(&route_id.peer_id, event).await;
        }
    }

    async fn open_route(
        &self,
        route_id: &RouteId,
        source: SourceSpec,
    ) -> Result<(u16, Arc<dyn MediaRoute>), AddError> {
        let port = self.ports.allocate().ok_or(AddError::Capacity)?;

        let spec = RouteSpec {
            id: route_id.clone(),
            source,
            port,
        };
        match self.engine.add_route(spec, self.events_tx.clone()).await {
            Ok(route) => Ok((port, route)),
            Err(e) => {
                self.ports.release(port);
                Err(e.into())
            }
        }
    }

    async fn teardown(&self, mut session: PeerSession) {
        let route_id = session.route_id().clone();
        let port = session.port();
        match session.disconnect() {
            Some(route) => self.close_route(&route_id, route, port).await,
            None => {
                self.engine.remove_route(&route_id).await;
                self.ports.release(port);
            }
        }
    }

    async fn close_route(&self, route_id: &RouteId, route: Arc<dyn MediaRoute>, port: u16) {
        route.close().await;
        self.engine.remove_route(route_id).await;
        self.ports.release(port);
    }
}
