/// Events a transport reports to the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,

    /// The channel dropped on its own. Carries the reason when known.
    Disconnected(Option<String>),

    /// One inbound text frame.
    Message(String),
}
