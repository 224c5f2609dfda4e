pub mod test_config_reload;
pub mod test_connection_lifecycle;

use std::sync::Arc;
use std::time::Duration;

use edgecast_gateway::supervisor::SupervisorCounters;
use edgecast_gateway::{
    Collaborators, ConfigWatch, ConnectionState, Gateway, GatewayConfig, PeerRegistry,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::integration::FixedStatus;
use crate::utils::{MockMediaEngine, MockTransport, RecordingCommandSink};

pub struct TestGateway {
    pub config: ConfigWatch,
    pub transport: MockTransport,
    pub engine: MockMediaEngine,
    pub registry: Arc<PeerRegistry>,
    pub state: watch::Receiver<ConnectionState>,
    pub counters: Arc<SupervisorCounters>,
    pub shutdown: CancellationToken,
    pub task: JoinHandle<()>,
}

impl TestGateway {
    pub async fn wait_for_state(&mut self, expected: ConnectionState) -> bool {
        tokio::time::timeout(
            Duration::from_secs(30),
            self.state.wait_for(|state| *state == expected),
        )
        .await
        .is_ok_and(|r| r.is_ok())
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("gateway stops")
            .unwrap();
    }
}

pub fn start_gateway(config: GatewayConfig, transport: MockTransport) -> TestGateway {
    let config = ConfigWatch::new(config);
    let engine = MockMediaEngine::new();

    let gateway = Gateway::new(
        config.subscribe(),
        Collaborators {
            transport: Arc::new(transport.clone()),
            engine: Arc::new(engine.clone()),
            status: Arc::new(FixedStatus),
            commands: Arc::new(RecordingCommandSink::new()),
        },
    );

    let registry = gateway.registry();
    let state = gateway.subscribe_state();
    let counters = gateway.counters();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(gateway.run(shutdown.clone()));

    TestGateway {
        config,
        transport,
        engine,
        registry,
        state,
        counters,
        shutdown,
        task,
    }
}
