use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Counters the supervisor updates as it works. Shared with status readers.
#[derive(Debug, Default)]
pub struct SupervisorCounters {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    reconnects: AtomicU64,
    backoff_attempts: AtomicU32,
    unacked_heartbeats: AtomicU32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub messages_sent: u64,
    pub messages_received: u64,
    /// Successful connects after the first one.
    pub reconnects: u64,
    /// Failed or pending attempts since the last successful connect.
    pub backoff_attempts: u32,
    pub unacked_heartbeats: u32,
}

impl SupervisorCounters {
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            backoff_attempts: self.backoff_attempts.load(Ordering::Relaxed),
            unacked_heartbeats: self.unacked_heartbeats.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reconnected(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_backoff_attempts(&self, attempts: u32) {
        self.backoff_attempts.store(attempts, Ordering::Relaxed);
    }

    pub(crate) fn set_unacked_heartbeats(&self, count: u32) {
        self.unacked_heartbeats.store(count, Ordering::Relaxed);
    }
}
