//! Read-only status API.

use crate::registry::{PeerRegistry, RegistryStatistics};
use crate::session::PeerInfo;
use crate::supervisor::{ConnectionState, CounterSnapshot, SupervisorCounters};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use edgecast_core::PeerId;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Clone)]
pub struct StatusApi {
    registry: Arc<PeerRegistry>,
    state: watch::Receiver<ConnectionState>,
    counters: Arc<SupervisorCounters>,
}

#[derive(Debug, Serialize)]
pub struct GatewayState {
    pub state: ConnectionState,
    pub counters: CounterSnapshot,
}

impl StatusApi {
    pub fn new(
        registry: Arc<PeerRegistry>,
        state: watch::Receiver<ConnectionState>,
        counters: Arc<SupervisorCounters>,
    ) -> Self {
        Self {
            registry,
            state,
            counters,
        }
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/peers", get(list_peers))
            .route("/peers/{peer_id}", get(get_peer))
            .route("/stats", get(get_stats))
            .route("/state", get(get_state))
            .with_state(self)
    }

    pub async fn serve(self, addr: SocketAddr, shutdown: CancellationToken) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Status API listening on http://{addr}");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
    }
}

async fn list_peers(State(api): State<StatusApi>) -> Json<Vec<PeerInfo>> {
    Json(api.registry.all_peers().await)
}

async fn get_peer(
    State(api): State<StatusApi>,
    Path(peer_id): Path<String>,
) -> Result<Json<PeerInfo>, StatusCode> {
    api.registry
        .peer_info(&PeerId::from(peer_id))
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn get_stats(State(api): State<StatusApi>) -> Json<RegistryStatistics> {
    Json(api.registry.statistics().await)
}

async fn get_state(State(api): State<StatusApi>) -> Json<GatewayState> {
    Json(GatewayState {
        state: *api.state.borrow(),
        counters: api.counters.snapshot(),
    })
}
