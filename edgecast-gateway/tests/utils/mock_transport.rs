use async_trait::async_trait;
use edgecast_core::{SignalingCodec, SignalingMessage};
use edgecast_gateway::{Transport, TransportError, TransportEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Default)]
struct TransportLog {
    urls: Vec<String>,
    sent: Vec<String>,
    events: Option<mpsc::Sender<TransportEvent>>,
}

/// In-memory signaling channel. Connects instantly unless told to refuse,
/// records everything sent and lets tests inject server traffic.
#[derive(Clone, Default)]
pub struct MockTransport {
    log: Arc<Mutex<TransportLog>>,
    connected: Arc<AtomicBool>,
    refuse: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// URLs of every connect attempt, in order.
    pub fn connect_urls(&self) -> Vec<String> {
        self.log.lock().unwrap().urls.clone()
    }

    pub fn sent(&self) -> Vec<SignalingMessage> {
        self.log
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter_map(|text| SignalingCodec::parse(text).ok())
            .collect()
    }

    pub fn sent_actions(&self) -> Vec<&'static str> {
        self.sent().iter().map(SignalingMessage::action).collect()
    }

    /// Deliver a message as if the server had sent it.
    pub async fn deliver(&self, message: &SignalingMessage) {
        self.inject(TransportEvent::Message(SignalingCodec::serialize(message)))
            .await;
    }

    /// Drop the channel as if the server went away.
    pub async fn drop_connection(&self, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        self.inject(TransportEvent::Disconnected(Some(reason.to_string())))
            .await;
    }

    async fn inject(&self, event: TransportEvent) {
        let events = self.log.lock().unwrap().events.clone();
        if let Some(events) = events {
            let _ = events.send(event).await;
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &self,
        url: &str,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), TransportError> {
        self.log.lock().unwrap().urls.push(url.to_string());

        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Connect {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        self.connected.store(true, Ordering::SeqCst);
        self.log.lock().unwrap().events = Some(events.clone());
        let _ = events.send(TransportEvent::Connected).await;
        Ok(())
    }

    async fn send(&self, text: String) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        self.log.lock().unwrap().sent.push(text);
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.log.lock().unwrap().events = None;
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
