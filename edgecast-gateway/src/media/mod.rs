//! Boundary to the media-processing engine.
//!
//! The engine owns one route per viewer. Routes are driven by the registry
//! through [`MediaRoute`]; anything the engine learns on its own threads
//! (local ICE candidates, connectivity changes, counters) comes back as a
//! [`RouteEvent`] on the channel handed to [`MediaEngine::add_route`].

mod route_event;
mod rtp_engine;
mod rtp_route;

pub use route_event::{RouteEvent, RouteEventKind, RouteState, RouteStats};
pub use rtp_engine::RtpMediaEngine;

use crate::error::MediaError;
use async_trait::async_trait;
use edgecast_core::{PeerId, SdpKind, SourceSpec};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Identifies one incarnation of a route. A viewer that leaves and joins
/// again gets a new generation, so late events from the old route can be
/// told apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteId {
    pub peer_id: PeerId,
    pub generation: u64,
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.peer_id, self.generation)
    }
}

#[derive(Debug, Clone)]
pub struct RouteSpec {
    pub id: RouteId,
    pub source: SourceSpec,
    /// Leased port the engine fans the feed out to.
    pub port: u16,
}

#[async_trait]
pub trait MediaEngine: Send + Sync {
    async fn add_route(
        &self,
        spec: RouteSpec,
        events: mpsc::Sender<RouteEvent>,
    ) -> Result<Arc<dyn MediaRoute>, MediaError>;

    /// Drop the route if it is still the given incarnation.
    async fn remove_route(&self, route: &RouteId);
}

#[async_trait]
pub trait MediaRoute: Send + Sync {
    /// Produce a local offer and install it as the local description.
    async fn create_offer(&self) -> Result<String, MediaError>;

    /// Apply the remote side's description. For an offer the generated
    /// answer is returned.
    async fn set_remote_description(
        &self,
        kind: SdpKind,
        sdp: String,
    ) -> Result<Option<String>, MediaError>;

    async fn add_ice_candidate(&self, candidate: String, mline_index: u16)
    -> Result<(), MediaError>;

    async fn close(&self);

    fn stats(&self) -> RouteStats;
}
