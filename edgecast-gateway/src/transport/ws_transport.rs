use crate::error::TransportError;
use crate::transport::{Transport, TransportEvent};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const CLOSE_GRACE: Duration = Duration::from_secs(1);

struct Connection {
    outbound: mpsc::UnboundedSender<Message>,
    alive: Arc<AtomicBool>,
    cancel: CancellationToken,
}

/// WebSocket client for the signaling server, text frames only.
#[derive(Default)]
pub struct WsTransport {
    connection: Mutex<Option<Connection>>,
}

impl WsTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(
        &self,
        url: &str,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), TransportError> {
        self.disconnect().await;

        let (socket, _response) =
            tokio_tungstenite::connect_async(url)
                .await
                .map_err(|e| TransportError::Connect {
                    url: url.to_owned(),
                    reason: e.to_string(),
                })?;
        info!("Signaling connected to {url}");

        let (mut sink, mut stream) = socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let alive = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        *self.lock() = Some(Connection {
            outbound: tx,
            alive: Arc::clone(&alive),
            cancel: cancel.clone(),
        });

        let _ = events.send(TransportEvent::Connected).await;

        let mut send_task = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if sink.send(msg).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let inbound = events.clone();
        let mut recv_task = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if inbound
                            .send(TransportEvent::Message(text.as_str().to_owned()))
                            .await
                            .is_err()
                        {
                            return None;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        return Some(match frame {
                            Some(frame) => format!("closed by server: {}", frame.reason.as_str()),
                            None => "closed by server".to_owned(),
                        });
                    }
                    Ok(_) => {}
                    Err(e) => return Some(e.to_string()),
                }
            }
            Some("stream ended".to_owned())
        });

        tokio::spawn(async move {
            let reason = tokio::select! {
                _ = cancel.cancelled() => {
                    alive.store(false, Ordering::SeqCst);
                    let _ = tokio::time::timeout(CLOSE_GRACE, &mut send_task).await;
                    send_task.abort();
                    recv_task.abort();
                    debug!("Signaling connection closed locally");
                    return;
                }
                reason = &mut recv_task => {
                    send_task.abort();
                    reason.ok().flatten()
                }
                _ = &mut send_task => {
                    recv_task.abort();
                    Some("writer stopped".to_owned())
                }
            };

            alive.store(false, Ordering::SeqCst);
            warn!(
                "Signaling connection lost: {}",
                reason.as_deref().unwrap_or("unknown")
            );
            let _ = events.send(TransportEvent::Disconnected(reason)).await;
        });

        Ok(())
    }

    async fn send(&self, text: String) -> Result<(), TransportError> {
        let guard = self.lock();
        let connection = guard
            .as_ref()
            .filter(|c| c.alive.load(Ordering::SeqCst))
            .ok_or(TransportError::NotConnected)?;

        connection
            .outbound
            .send(Message::Text(text.into()))
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn disconnect(&self) {
        let Some(connection) = self.lock().take() else {
            return;
        };
        // dropping the queue makes the writer send the close frame
        connection.cancel.cancel();
    }

    fn is_connected(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|c| c.alive.load(Ordering::SeqCst))
    }
}
