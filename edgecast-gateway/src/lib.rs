pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod media;
pub mod ports;
pub mod registry;
pub mod router;
pub mod session;
pub mod signaling;
pub mod supervisor;
pub mod transport;

pub use config::{ConfigOverrides, ConfigWatch, GatewayConfig};
pub use error::*;
pub use gateway::{Collaborators, Gateway};
pub use media::{MediaEngine, MediaRoute, RouteEvent, RouteEventKind, RouteId, RouteSpec};
pub use ports::PortAllocator;
pub use registry::{PeerRegistry, RegistryStatistics};
pub use router::{CommandSink, InboundFrame, LoggingCommandSink, MessageRouter, SignalingSender};
pub use session::{PeerInfo, PeerSession, SessionState};
pub use signaling::SignalingOutput;
pub use supervisor::{ConnectionState, ConnectionSupervisor, StatusProvider};
pub use transport::{Transport, TransportEvent};
