//! Process-wide counters for connections, broadcasts and failures
//!
//! All counters are relaxed atomics; they feed periodic logging, never
//! control flow.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Shared server statistics
#[derive(Debug, Default)]
pub struct ServerStats {
    /// Clients currently connected
    clients_connected: AtomicUsize,
    /// Total clients accepted since start
    clients_total: AtomicU64,
    /// Broadcast calls performed
    broadcasts: AtomicU64,
    /// Per-client deliveries that reached a send queue
    deliveries: AtomicU64,
    /// Per-client deliveries that found a dead channel
    delivery_failures: AtomicU64,
    /// Events dropped for a client because its queue was full
    dropped_events: AtomicU64,
    /// Inbound messages dropped as malformed
    malformed_messages: AtomicU64,
    /// Messages whose inference call failed
    inference_failures: AtomicU64,
}

impl ServerStats {
    /// Create a zeroed stats instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new client connection
    pub fn client_connected(&self) {
        self.clients_connected.fetch_add(1, Ordering::Relaxed);
        self.clients_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a client disconnection
    pub fn client_disconnected(&self) {
        self.clients_connected.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record one broadcast call with its per-client outcomes
    pub fn record_broadcast(&self, delivered: u64, dropped: u64, failed: u64) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.deliveries.fetch_add(delivered, Ordering::Relaxed);
        self.dropped_events.fetch_add(dropped, Ordering::Relaxed);
        self.delivery_failures.fetch_add(failed, Ordering::Relaxed);
    }

    /// Record a malformed inbound message
    pub fn record_malformed(&self) {
        self.malformed_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an inference failure
    pub fn record_inference_failure(&self) {
        self.inference_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Clients currently connected
    pub fn clients_connected(&self) -> usize {
        self.clients_connected.load(Ordering::Relaxed)
    }

    /// Get a point-in-time copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            clients_connected: self.clients_connected.load(Ordering::Relaxed),
            clients_total: self.clients_total.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            dropped_events: self.dropped_events.load(Ordering::Relaxed),
            malformed_messages: self.malformed_messages.load(Ordering::Relaxed),
            inference_failures: self.inference_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ServerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub clients_connected: usize,
    pub clients_total: u64,
    pub broadcasts: u64,
    pub deliveries: u64,
    pub delivery_failures: u64,
    pub dropped_events: u64,
    pub malformed_messages: u64,
    pub inference_failures: u64,
}
