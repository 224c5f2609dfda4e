use crate::config::GatewayConfig;
use crate::registry::PeerRegistry;
use crate::router::{InboundFrame, RouterNotice};
use crate::supervisor::{
    Backoff, ConnectionState, StatusProvider, SupervisorCounters,
};
use crate::transport::{Transport, TransportEvent};
use edgecast_core::{SignalingCodec, SignalingMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const TRANSPORT_EVENT_BUFFER: usize = 256;

/// Channels tying the supervisor to the message router.
pub struct SupervisorLinks {
    /// Inbound frames for the router.
    pub inbound: mpsc::Sender<InboundFrame>,
    /// Serialized messages waiting to go out.
    pub outbound: mpsc::UnboundedReceiver<String>,
    pub notices: mpsc::UnboundedReceiver<RouterNotice>,
}

/// Keeps the signaling channel up: connects with backoff, registers the
/// camera, pushes status heartbeats and tears every peer down when the
/// channel is lost. It is the only component that decides on global
/// teardown and retry.
pub struct ConnectionSupervisor {
    transport: Arc<dyn Transport>,
    registry: Arc<PeerRegistry>,
    status: Arc<dyn StatusProvider>,
    config_rx: watch::Receiver<Arc<GatewayConfig>>,
    config: Arc<GatewayConfig>,
    state_tx: watch::Sender<ConnectionState>,
    counters: Arc<SupervisorCounters>,
    backoff: Backoff,
    next_attempt: Instant,
    unacked_heartbeats: u32,
    ever_connected: bool,
    links: SupervisorLinks,
    transport_tx: mpsc::Sender<TransportEvent>,
    transport_rx: mpsc::Receiver<TransportEvent>,
}

impl ConnectionSupervisor {
    pub fn new(
        mut config_rx: watch::Receiver<Arc<GatewayConfig>>,
        transport: Arc<dyn Transport>,
        registry: Arc<PeerRegistry>,
        status: Arc<dyn StatusProvider>,
        links: SupervisorLinks,
    ) -> Self {
        let config = config_rx.borrow_and_update().clone();
        let backoff = Backoff::new(
            config.heartbeat.backoff_unit(),
            config.heartbeat.backoff_cap,
        );
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (transport_tx, transport_rx) = mpsc::channel(TRANSPORT_EVENT_BUFFER);

        Self {
            transport,
            registry,
            status,
            config_rx,
            config,
            state_tx,
            counters: Arc::new(SupervisorCounters::default()),
            backoff,
            next_attempt: Instant::now(),
            unacked_heartbeats: 0,
            ever_connected: false,
            links,
            transport_tx,
            transport_rx,
        }
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn counters(&self) -> Arc<SupervisorCounters> {
        Arc::clone(&self.counters)
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Connection supervisor started");
        self.next_attempt = Instant::now();
        let mut heartbeat = heartbeat_interval(&self.config);
        let mut config_open = true;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,

                _ = heartbeat.tick() => self.on_heartbeat().await,

                Some(event) = self.transport_rx.recv() => self.on_transport_event(event).await,

                Some(notice) = self.links.notices.recv() => self.on_notice(notice),

                Some(text) = self.links.outbound.recv() => {
                    self.send_text(text).await;
                }

                changed = self.config_rx.changed(), if config_open => {
                    if changed.is_err() {
                        debug!("Config publisher gone, keeping current settings");
                        config_open = false;
                        continue;
                    }
                    if self.apply_config().await {
                        heartbeat = heartbeat_interval(&self.config);
                    }
                }
            }
        }

        self.shutdown().await;
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state_tx.send_replace(next);
        if previous != next {
            info!("Connection state {previous} -> {next}");
        }
    }

    async fn on_heartbeat(&mut self) {
        let state = self.state();

        if state.wants_connection() {
            if !self.transport.is_connected() && Instant::now() >= self.next_attempt {
                self.attempt_connect().await;
            }
            return;
        }

        if state.is_registered() {
            self.send_status().await;
        }
    }

    async fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => self.on_connected().await,
            TransportEvent::Disconnected(reason) => {
                if self.state().wants_connection() {
                    debug!("Ignoring disconnect while not connected");
                    return;
                }
                let reason = reason.unwrap_or_else(|| "unknown".to_owned());
                warn!("Signaling channel lost: {reason}");
                self.drop_connection().await;
                self.backoff.reset();
                self.schedule_retry();
            }
            TransportEvent::Message(text) => {
                self.counters.message_received();
                let frame = InboundFrame {
                    epoch: self.registry.epoch(),
                    text,
                };
                if self.links.inbound.send(frame).await.is_err() {
                    warn!("Message router is gone, dropping inbound message");
                }
            }
        }
    }

    fn on_notice(&mut self, notice: RouterNotice) {
        match notice {
            RouterNotice::StatusAck => {
                self.unacked_heartbeats = 0;
                self.counters.set_unacked_heartbeats(0);
                if self.state() == ConnectionState::Registered {
                    info!("Registration confirmed by server");
                    self.set_state(ConnectionState::Running);
                }
            }
        }
    }

    async fn attempt_connect(&mut self) {
        self.set_state(ConnectionState::Connecting);
        let url = self.config.signaling_url();
        info!("Connecting to {url}");

        let connect = self.transport.connect(&url, self.transport_tx.clone());
        let failure = match tokio::time::timeout(CONNECT_TIMEOUT, connect).await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(_) => {
                self.transport.disconnect().await;
                format!("no answer within {CONNECT_TIMEOUT:?}")
            }
        };

        warn!("Signaling connect failed: {failure}");
        self.set_state(ConnectionState::Error);
        self.schedule_retry();
    }

    async fn on_connected(&mut self) {
        if !self.state().wants_connection() {
            debug!("Ignoring duplicate connect notification");
            return;
        }

        if self.ever_connected {
            self.counters.reconnected();
        }
        self.ever_connected = true;
        self.backoff.reset();
        self.counters.set_backoff_attempts(0);
        self.set_state(ConnectionState::Connected);

        self.register().await;
    }

    /// Send the registration and assume it took. The server does not always
    /// answer; a later status ack promotes the state to `Running`.
    async fn register(&mut self) {
        self.set_state(ConnectionState::Registering);

        let signaling = &self.config.signaling;
        let message = SignalingMessage::Register {
            camera_id: signaling.camera_id.clone(),
            firmware_version: signaling.firmware_version.clone(),
            ai_version: signaling.ai_version.clone(),
        };

        if !self.send_message(&message).await {
            warn!("Registration could not be sent, dropping connection");
            self.transport.disconnect().await;
            self.drop_connection().await;
            self.set_state(ConnectionState::Error);
            self.schedule_retry();
            return;
        }

        self.unacked_heartbeats = 0;
        self.counters.set_unacked_heartbeats(0);
        self.set_state(ConnectionState::Registered);
    }

    async fn send_status(&mut self) {
        let report = self.status.report().await;
        if !self.send_message(&report.into_message()).await {
            return;
        }

        if self.state() != ConnectionState::Registered {
            return;
        }
        self.unacked_heartbeats = self.unacked_heartbeats.saturating_add(1);
        self.counters.set_unacked_heartbeats(self.unacked_heartbeats);

        let threshold = self.config.heartbeat.unconfirmed_warn_after;
        if threshold > 0 && self.unacked_heartbeats == threshold {
            warn!(
                "Server has not acknowledged registration after {} status messages",
                self.unacked_heartbeats
            );
        }
    }

    async fn send_message(&mut self, message: &SignalingMessage) -> bool {
        self.send_text(SignalingCodec::serialize(message)).await
    }

    async fn send_text(&mut self, text: String) -> bool {
        if !self.transport.is_connected() {
            debug!("Not connected, dropping outbound message");
            return false;
        }

        match self.transport.send(text).await {
            Ok(()) => {
                self.counters.message_sent();
                true
            }
            Err(e) => {
                warn!("Failed to send signaling message: {e}");
                false
            }
        }
    }

    /// Everything negotiated over the old channel is void. `remove_all` moves
    /// the registry epoch on, so inbound frames still queued for the router
    /// are discarded there.
    async fn drop_connection(&mut self) {
        self.set_state(ConnectionState::Connecting);

        let removed = self.registry.remove_all().await;
        if removed > 0 {
            info!("Tore down {removed} peers after losing signaling");
        }

        let mut stale = 0;
        while self.links.outbound.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            debug!("Discarded {stale} queued outbound messages");
        }
    }

    fn schedule_retry(&mut self) {
        let delay = self.backoff.next_delay();
        self.next_attempt = Instant::now() + delay;
        self.counters.set_backoff_attempts(self.backoff.attempts());
        info!("Next connect attempt in {delay:?}");
    }

    /// Pick up a new configuration. Returns whether the heartbeat period
    /// changed.
    async fn apply_config(&mut self) -> bool {
        let next = self.config_rx.borrow_and_update().clone();
        let previous = std::mem::replace(&mut self.config, next);
        info!("Applying updated configuration");

        self.backoff.set_unit(
            self.config.heartbeat.backoff_unit(),
            self.config.heartbeat.backoff_cap,
        );

        let endpoint_changed = previous.signaling_url() != self.config.signaling_url()
            || previous.signaling.firmware_version != self.config.signaling.firmware_version
            || previous.signaling.ai_version != self.config.signaling.ai_version;

        if endpoint_changed && (self.transport.is_connected() || !self.state().wants_connection()) {
            info!("Signaling identity changed, reconnecting");
            self.transport.disconnect().await;
            self.drop_connection().await;
            self.backoff.reset();
            self.counters.set_backoff_attempts(0);
            self.next_attempt = Instant::now();
        }

        previous.heartbeat.interval_ms != self.config.heartbeat.interval_ms
    }

    async fn shutdown(&mut self) {
        info!("Connection supervisor shutting down");
        self.transport.disconnect().await;
        self.registry.remove_all().await;
        self.set_state(ConnectionState::Disconnected);

        let c = self.counters.snapshot();
        info!(
            "Signaling totals: {} sent, {} received, {} reconnects",
            c.messages_sent, c.messages_received, c.reconnects
        );
    }
}

fn heartbeat_interval(config: &GatewayConfig) -> Interval {
    let mut interval = tokio::time::interval(config.heartbeat.interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
