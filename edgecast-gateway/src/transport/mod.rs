//! Signaling channel to the central server.

mod transport_event;
mod ws_transport;

pub use transport_event::TransportEvent;
pub use ws_transport::WsTransport;

use crate::error::TransportError;
use async_trait::async_trait;
use tokio::sync::mpsc;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the channel. Events for this connection, starting with
    /// [`TransportEvent::Connected`], arrive on `events`.
    async fn connect(
        &self,
        url: &str,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), TransportError>;

    async fn send(&self, text: String) -> Result<(), TransportError>;

    /// Close the channel without emitting `Disconnected`.
    async fn disconnect(&self);

    fn is_connected(&self) -> bool;
}
