mod command_sink;
mod message_router;
mod signaling_sender;

pub use command_sink::{CommandSink, LoggingCommandSink};
pub use message_router::{InboundFrame, MessageRouter, RouterNotice};
pub use signaling_sender::SignalingSender;
