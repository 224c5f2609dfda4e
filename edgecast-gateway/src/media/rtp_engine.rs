use crate::config::MediaConfig;
use crate::error::MediaError;
use crate::media::rtp_route::RtpRoute;
use crate::media::{MediaEngine, MediaRoute, RouteEvent, RouteId, RouteSpec};
use async_trait::async_trait;
use dashmap::DashMap;
use edgecast_core::PeerId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// webrtc-rs backed engine: every route is a peer connection with one H264
/// track, fed from the UDP port the route was given.
pub struct RtpMediaEngine {
    config: MediaConfig,
    routes: DashMap<PeerId, Arc<RtpRoute>>,
}

impl RtpMediaEngine {
    pub fn new(config: MediaConfig) -> Self {
        Self {
            config,
            routes: DashMap::new(),
        }
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

#[async_trait]
impl MediaEngine for RtpMediaEngine {
    async fn add_route(
        &self,
        spec: RouteSpec,
        events: mpsc::Sender<RouteEvent>,
    ) -> Result<Arc<dyn MediaRoute>, MediaError> {
        let peer_id = spec.id.peer_id.clone();
        let port = spec.port;

        let route = RtpRoute::open(spec, &self.config, events)
            .await
            .map(Arc::new)
            .map_err(|e| MediaError::Setup(format!("{e:#}")))?;

        if let Some(stale) = self.routes.insert(peer_id.clone(), Arc::clone(&route)) {
            warn!("Replacing stale route for peer {peer_id}");
            stale.close().await;
        }

        info!(
            "Route for peer {peer_id} open on port {port}, {} routes open",
            self.route_count()
        );
        Ok(route)
    }

    async fn remove_route(&self, route: &RouteId) {
        let removed = self
            .routes
            .remove_if(&route.peer_id, |_, open| open.id() == route);
        if let Some((_, open)) = removed {
            open.close().await;
            info!("Route {route} removed");
        }
    }
}
