use async_trait::async_trait;
use edgecast_core::{CommandKind, PeerId};
use serde_json::Value;
use tracing::info;

/// Receives control requests relayed from viewers (PTZ, recording, custom).
/// The hardware behind them lives outside the gateway.
#[async_trait]
pub trait CommandSink: Send + Sync {
    async fn handle_command(&self, peer_id: PeerId, command: CommandKind, parameters: Value);
}

/// Sink that only records what was asked for.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCommandSink;

#[async_trait]
impl CommandSink for LoggingCommandSink {
    async fn handle_command(&self, peer_id: PeerId, command: CommandKind, parameters: Value) {
        info!("Command '{command}' from peer {peer_id}: {parameters}");
    }
}
