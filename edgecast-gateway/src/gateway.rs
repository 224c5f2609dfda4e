use crate::config::GatewayConfig;
use crate::http::StatusApi;
use crate::media::MediaEngine;
use crate::ports::PortAllocator;
use crate::registry::PeerRegistry;
use crate::router::{CommandSink, InboundFrame, MessageRouter, SignalingSender};
use crate::supervisor::{
    ConnectionState, ConnectionSupervisor, StatusProvider, SupervisorCounters, SupervisorLinks,
};
use crate::transport::Transport;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const INBOUND_BUFFER: usize = 256;

/// External collaborators the gateway drives.
pub struct Collaborators {
    pub transport: Arc<dyn Transport>,
    pub engine: Arc<dyn MediaEngine>,
    pub status: Arc<dyn StatusProvider>,
    pub commands: Arc<dyn CommandSink>,
}

/// Registry, router and supervisor wired together.
///
/// The port range is fixed at construction. Later config changes reach the
/// supervisor and whichever collaborators subscribe to the same watch.
pub struct Gateway {
    registry: Arc<PeerRegistry>,
    router: MessageRouter,
    inbound: mpsc::Receiver<InboundFrame>,
    supervisor: ConnectionSupervisor,
}

impl Gateway {
    pub fn new(config: watch::Receiver<Arc<GatewayConfig>>, parts: Collaborators) -> Self {
        let ports = PortAllocator::from_config(&config.borrow().ports);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();

        let signaling = Arc::new(SignalingSender::new(outbound_tx));
        let registry = Arc::new(PeerRegistry::new(ports, parts.engine, signaling));
        let router = MessageRouter::new(Arc::clone(&registry), parts.commands, notices_tx);

        let supervisor = ConnectionSupervisor::new(
            config,
            parts.transport,
            Arc::clone(&registry),
            parts.status,
            SupervisorLinks {
                inbound: inbound_tx,
                outbound: outbound_rx,
                notices: notices_rx,
            },
        );

        Self {
            registry,
            router,
            inbound: inbound_rx,
            supervisor,
        }
    }

    pub fn registry(&self) -> Arc<PeerRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.supervisor.subscribe_state()
    }

    pub fn counters(&self) -> Arc<SupervisorCounters> {
        self.supervisor.counters()
    }

    pub fn status_api(&self) -> StatusApi {
        StatusApi::new(self.registry(), self.subscribe_state(), self.counters())
    }

    /// Run until `shutdown` fires. Peers are torn down before this returns.
    pub async fn run(self, shutdown: CancellationToken) {
        let Gateway {
            registry,
            router,
            inbound,
            supervisor,
        } = self;

        let pump = tokio::spawn(Arc::clone(&registry).run(shutdown.clone()));
        let routing = tokio::spawn(router.run(inbound, shutdown.clone()));

        supervisor.run(shutdown.clone()).await;

        for (name, task) in [("registry pump", pump), ("message router", routing)] {
            if let Err(e) = task.await {
                warn!("{name} task ended abnormally: {e}");
            }
        }
        info!("Gateway stopped");
    }
}
