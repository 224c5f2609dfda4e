mod peer_registry;
mod pending_ticket;
mod registry_statistics;

pub use peer_registry::PeerRegistry;
pub use registry_statistics::RegistryStatistics;
