use async_trait::async_trait;
use edgecast_core::{PeerId, SdpKind};
use edgecast_gateway::media::{
    MediaEngine, MediaRoute, RouteEvent, RouteEventKind, RouteId, RouteSpec, RouteStats,
};
use edgecast_gateway::MediaError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, mpsc};

/// Scripted route. Offers and answers are derived from the route id so tests
/// can tell incarnations apart.
pub struct MockRoute {
    id: RouteId,
    fail_negotiation: bool,
    gather_early: bool,
    events: mpsc::Sender<RouteEvent>,
    closed: AtomicBool,
    candidates: Mutex<Vec<(String, u16)>>,
}

impl MockRoute {
    pub fn id(&self) -> &RouteId {
        &self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn candidates(&self) -> Vec<(String, u16)> {
        self.candidates.lock().unwrap().clone()
    }

    /// Report a host candidate before the local description is returned,
    /// then let the event pump run.
    async fn gather(&self) {
        if !self.gather_early {
            return;
        }
        let kind = RouteEventKind::IceCandidate {
            candidate: format!("candidate:early-{}", self.id),
            mline_index: 0,
        };
        let _ = self.events.send(RouteEvent::new(self.id.clone(), kind)).await;
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl MediaRoute for MockRoute {
    async fn create_offer(&self) -> Result<String, MediaError> {
        if self.fail_negotiation {
            return Err(MediaError::Negotiation("scripted offer failure".to_string()));
        }
        self.gather().await;
        Ok(format!("offer-{}", self.id))
    }

    async fn set_remote_description(
        &self,
        kind: SdpKind,
        _sdp: String,
    ) -> Result<Option<String>, MediaError> {
        if self.fail_negotiation {
            return Err(MediaError::Negotiation("scripted sdp failure".to_string()));
        }
        if kind == SdpKind::Offer {
            self.gather().await;
        }
        Ok(match kind {
            SdpKind::Offer => Some(format!("answer-{}", self.id)),
            SdpKind::Answer => None,
        })
    }

    async fn add_ice_candidate(
        &self,
        candidate: String,
        mline_index: u16,
    ) -> Result<(), MediaError> {
        self.candidates.lock().unwrap().push((candidate, mline_index));
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn stats(&self) -> RouteStats {
        RouteStats::default()
    }
}

#[derive(Default)]
struct EngineState {
    routes: HashMap<PeerId, Arc<MockRoute>>,
    events: Option<mpsc::Sender<RouteEvent>>,
}

/// Media engine double.
///
/// Can be told to refuse routes, to hand out routes that fail negotiation,
/// or to hold `add_route` until [`MockMediaEngine::release_gate`] is called.
#[derive(Clone, Default)]
pub struct MockMediaEngine {
    state: Arc<Mutex<EngineState>>,
    fail_add: Arc<AtomicBool>,
    fail_negotiation: Arc<AtomicBool>,
    gather_early: Arc<AtomicBool>,
    gated: Arc<AtomicBool>,
    gate: Arc<Notify>,
    entered: Arc<Notify>,
    added: Arc<AtomicUsize>,
    removed: Arc<AtomicUsize>,
}

impl MockMediaEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_add(&self, fail: bool) {
        self.fail_add.store(fail, Ordering::SeqCst);
    }

    pub fn fail_negotiation(&self, fail: bool) {
        self.fail_negotiation.store(fail, Ordering::SeqCst);
    }

    /// Hand out routes that gather a candidate while the local description
    /// is still being produced.
    pub fn gather_early(&self, early: bool) {
        self.gather_early.store(early, Ordering::SeqCst);
    }

    /// Make the next `add_route` calls wait for [`Self::release_gate`].
    pub fn hold_adds(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release_gate(&self) {
        self.gated.store(false, Ordering::SeqCst);
        self.gate.notify_waiters();
    }

    /// Resolves once some `add_route` call is parked at the gate.
    pub async fn wait_until_held(&self) {
        self.entered.notified().await;
    }

    pub fn route(&self, peer_id: &PeerId) -> Option<Arc<MockRoute>> {
        self.state.lock().unwrap().routes.get(peer_id).cloned()
    }

    pub fn route_count(&self) -> usize {
        self.state.lock().unwrap().routes.len()
    }

    pub fn added(&self) -> usize {
        self.added.load(Ordering::SeqCst)
    }

    pub fn removed(&self) -> usize {
        self.removed.load(Ordering::SeqCst)
    }

    /// Push an event for an arbitrary route incarnation.
    pub async fn emit_for(&self, route: RouteId, kind: RouteEventKind) -> bool {
        let events = self.state.lock().unwrap().events.clone();
        match events {
            Some(events) => events.send(RouteEvent::new(route, kind)).await.is_ok(),
            None => false,
        }
    }

    /// Push an event as if the engine had raised it for `peer_id`'s route.
    pub async fn emit(&self, peer_id: &PeerId, kind: RouteEventKind) -> bool {
        let (route, events) = {
            let state = self.state.lock().unwrap();
            let Some(route) = state.routes.get(peer_id) else {
                return false;
            };
            let Some(events) = state.events.clone() else {
                return false;
            };
            (route.id().clone(), events)
        };
        events.send(RouteEvent::new(route, kind)).await.is_ok()
    }
}

#[async_trait]
impl MediaEngine for MockMediaEngine {
    async fn add_route(
        &self,
        spec: RouteSpec,
        events: mpsc::Sender<RouteEvent>,
    ) -> Result<Arc<dyn MediaRoute>, MediaError> {
        if self.gated.load(Ordering::SeqCst) {
            let released = self.gate.notified();
            tokio::pin!(released);
            released.as_mut().enable();
            self.entered.notify_one();
            released.await;
        }

        if self.fail_add.load(Ordering::SeqCst) {
            return Err(MediaError::Setup("scripted setup failure".to_string()));
        }

        let route = Arc::new(MockRoute {
            id: spec.id.clone(),
            fail_negotiation: self.fail_negotiation.load(Ordering::SeqCst),
            gather_early: self.gather_early.load(Ordering::SeqCst),
            events: events.clone(),
            closed: AtomicBool::new(false),
            candidates: Mutex::new(Vec::new()),
        });

        let mut state = self.state.lock().unwrap();
        state.events = Some(events);
        state.routes.insert(spec.id.peer_id.clone(), Arc::clone(&route));
        self.added.fetch_add(1, Ordering::SeqCst);

        Ok(route)
    }

    async fn remove_route(&self, route: &RouteId) {
        let mut state = self.state.lock().unwrap();
        let current = state
            .routes
            .get(&route.peer_id)
            .is_some_and(|r| r.id() == route);
        if current {
            state.routes.remove(&route.peer_id);
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
    }
}
