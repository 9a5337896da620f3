//! Fan-out of result events to registered clients

use std::sync::Arc;

use crate::error::DeliveryError;
use crate::payload::OutboundEvent;
use crate::registry::{ClientId, ClientRegistry};
use crate::stats::ServerStats;

/// Per-client outcome totals for one broadcast call
///
/// A partial broadcast (some clients receive, one fails) is a normal
/// outcome, not an error state for the call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Events that reached a client send queue
    pub delivered: usize,
    /// Events dropped because a client's queue was full
    pub dropped: usize,
    /// Clients found dead and removed from the registry
    pub pruned: usize,
}

/// Delivers result events to every currently registered client
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<ClientRegistry>,
    stats: Arc<ServerStats>,
}

impl Broadcaster {
    /// Create a broadcaster over a registry
    pub fn new(registry: Arc<ClientRegistry>, stats: Arc<ServerStats>) -> Self {
        Self { registry, stats }
    }

    /// The registry this broadcaster delivers to
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Deliver one event to every client in the current registry snapshot
    ///
    /// The event is serialized once; each member is attempted independently
    /// and a per-member failure never aborts delivery to the rest. Members
    /// whose channel is closed are presumed dead and removed from the
    /// registry after the delivery loop completes, never mid-iteration.
    /// There is no retry; delivery is fire-and-report.
    pub fn broadcast(&self, event: &OutboundEvent) -> Result<BroadcastReport, serde_json::Error> {
        let frame = event.to_frame()?;
        let snapshot = self.registry.snapshot();

        let mut report = BroadcastReport::default();
        let mut dead: Vec<ClientId> = Vec::new();

        for client in &snapshot {
            match client.try_send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(DeliveryError::QueueFull(id)) => {
                    report.dropped += 1;
                    tracing::warn!(client = %id, "Send queue full, event dropped");
                }
                Err(DeliveryError::Closed(id)) => {
                    tracing::debug!(client = %id, "Send failed, client presumed dead");
                    dead.push(id);
                }
            }
        }

        // Removal deferred until the snapshot walk is done
        for id in &dead {
            self.registry.remove(*id);
        }
        report.pruned = dead.len();

        self.stats.record_broadcast(
            report.delivered as u64,
            report.dropped as u64,
            report.pruned as u64,
        );

        tracing::debug!(
            delivered = report.delivered,
            dropped = report.dropped,
            pruned = report.pruned,
            "Broadcast complete"
        );

        Ok(report)
    }
}
