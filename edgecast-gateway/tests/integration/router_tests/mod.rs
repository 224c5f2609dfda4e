pub mod test_peer_lifecycle;
pub mod test_rejected_input;

use std::sync::Arc;

use edgecast_gateway::MessageRouter;
use edgecast_gateway::router::RouterNotice;
use tokio::sync::mpsc;

use crate::integration::{TestRegistry, create_test_registry};
use crate::utils::RecordingCommandSink;

pub struct TestRouter {
    pub router: MessageRouter,
    pub parts: TestRegistry,
    pub commands: RecordingCommandSink,
    pub notices: mpsc::UnboundedReceiver<RouterNotice>,
}

pub fn create_test_router() -> TestRouter {
    let parts = create_test_registry(4);
    let commands = RecordingCommandSink::new();
    let (notices_tx, notices) = mpsc::unbounded_channel();

    let router = MessageRouter::new(
        Arc::clone(&parts.registry),
        Arc::new(commands.clone()),
        notices_tx,
    );

    TestRouter {
        router,
        parts,
        commands,
        notices,
    }
}
