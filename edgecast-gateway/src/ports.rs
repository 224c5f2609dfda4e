use crate::config::PortsConfig;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

struct PortPool {
    free: VecDeque<u16>,
    leased: HashSet<u16>,
}

/// Fixed pool of media ports, one per concurrent viewer.
///
/// Ports are handed out oldest-released first. Every operation is O(1) and
/// holds the internal lock only for the bookkeeping itself.
pub struct PortAllocator {
    pool: Mutex<PortPool>,
    capacity: usize,
}

impl PortAllocator {
    /// Walk up from `base_port` in steps of `stride`, skipping `reserved`,
    /// until `max_leases` ports are collected or the port space runs out.
    pub fn new(base_port: u16, stride: u16, max_leases: usize, reserved: &[u16]) -> Self {
        let stride = stride.max(1);
        let mut free = VecDeque::with_capacity(max_leases);
        let mut next = Some(base_port);

        while let Some(port) = next {
            if free.len() == max_leases {
                break;
            }
            if !reserved.contains(&port) {
                free.push_back(port);
            }
            next = port.checked_add(stride);
        }

        let capacity = free.len();
        Self {
            pool: Mutex::new(PortPool {
                free,
                leased: HashSet::with_capacity(capacity),
            }),
            capacity,
        }
    }

    pub fn from_config(config: &PortsConfig) -> Self {
        Self::new(
            config.base_port,
            config.stride,
            config.max_peers,
            &config.reserved,
        )
    }

    pub fn allocate(&self) -> Option<u16> {
        let mut pool = self.lock();
        let port = pool.free.pop_front()?;
        pool.leased.insert(port);
        debug!("Leased port {port}");
        Some(port)
    }

    /// Return a port to the pool. Ports that are not leased are ignored, so
    /// duplicate teardown paths are harmless.
    pub fn release(&self, port: u16) {
        let mut pool = self.lock();
        if pool.leased.remove(&port) {
            pool.free.push_back(port);
            debug!("Released port {port}");
        }
    }

    pub fn is_leased(&self, port: u16) -> bool {
        self.lock().leased.contains(&port)
    }

    pub fn leased_count(&self) -> usize {
        self.lock().leased.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // Bookkeeping cannot be left half-done, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, PortPool> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
