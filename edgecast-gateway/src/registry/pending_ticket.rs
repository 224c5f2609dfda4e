/// Placeholder for an `add_peer` that is still waiting on the media engine.
///
/// While it exists the id counts as taken. A removal that arrives in the
/// meantime only flags it; the add sees the flag when it resumes and undoes
/// its own work.
#[derive(Debug)]
pub(crate) struct PendingTicket {
    cancelled: bool,
}

impl PendingTicket {
    pub(crate) fn new() -> Self {
        Self { cancelled: false }
    }

    pub(crate) fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}
