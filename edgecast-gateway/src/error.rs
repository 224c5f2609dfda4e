use crate::session::SessionState;
use edgecast_core::PeerId;
use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by a media engine or one of its routes.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("route setup failed: {0}")]
    Setup(String),

    #[error("negotiation failed: {0}")]
    Negotiation(String),
}

/// Why `add_peer` refused a viewer. Nothing is left allocated in any case.
#[derive(Debug, Error)]
pub enum AddError {
    #[error("peer {0} is already registered or being added")]
    Duplicate(PeerId),

    #[error("no free media port")]
    Capacity,

    #[error("media engine refused route: {0}")]
    Media(#[from] MediaError),

    /// Peer was removed while its add was still in flight.
    #[error("add of peer {0} was cancelled")]
    Cancelled(PeerId),
}

/// Offer/answer/ICE failures for one session.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("peer {0} not found")]
    UnknownPeer(PeerId),

    #[error("peer {peer_id}: cannot {operation} in state {state:?}")]
    InvalidState {
        peer_id: PeerId,
        state: SessionState,
        operation: &'static str,
    },

    #[error(transparent)]
    Media(#[from] MediaError),
}

/// Signaling channel failures. These are the supervisor's business.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    #[error("transport is not connected")]
    NotConnected,

    #[error("send failed: {0}")]
    Send(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
