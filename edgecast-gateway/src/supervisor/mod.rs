mod backoff;
mod connection_state;
mod connection_supervisor;
mod status_provider;
mod supervisor_counters;

pub use backoff::Backoff;
pub use connection_state::ConnectionState;
pub use connection_supervisor::{ConnectionSupervisor, SupervisorLinks};
pub use status_provider::{StaticStatusProvider, StatusProvider, StatusReport};
pub use supervisor_counters::{CounterSnapshot, SupervisorCounters};
