//! Fan-out of notification events to live subscribers.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, warn};

use super::events::{NotificationEvent, SocketFrame};
use super::registry::{ConnectionRegistry, DeliveryError};

/// Result of one broadcast round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Subscribers in the snapshot.
    pub recipients: usize,
    /// Frames queued successfully.
    pub delivered: usize,
    /// Frames that could not be queued.
    pub dropped: usize,
}

/// Pushes events to every subscriber in a registry snapshot.
#[derive(Debug, Clone)]
pub struct RealtimeBroadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl RealtimeBroadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Deliver `event` to all currently registered subscribers.
    ///
    /// Never fails from the caller's point of view: per-subscriber problems
    /// are logged and skipped, and subscribers whose connection is gone are
    /// pruned from the registry.
    pub fn broadcast(&self, event: &NotificationEvent) -> BroadcastReport {
        let frame = match serde_json::to_string(&SocketFrame::task_notification(event.clone())) {
            Ok(json) => Arc::<str>::from(json),
            Err(e) => {
                error!(error = %e, "Failed to encode task notification frame");
                return BroadcastReport::default();
            }
        };

        let subscribers = self.registry.snapshot();
        let mut report = BroadcastReport {
            recipients: subscribers.len(),
            ..Default::default()
        };

        for subscriber in subscribers {
            match subscriber.deliver(Arc::clone(&frame)) {
                Ok(()) => report.delivered += 1,
                Err(DeliveryError::Closed) => {
                    report.dropped += 1;
                    warn!(subscriber_id = %subscriber.id(), "Subscriber gone, pruning");
                    self.registry.remove(subscriber.id());
                }
                Err(e @ DeliveryError::Full) => {
                    report.dropped += 1;
                    warn!(subscriber_id = %subscriber.id(), error = %e, "Dropping notification for slow subscriber");
                }
            }
        }

        debug!(
            recipients = report.recipients,
            delivered = report.delivered,
            dropped = report.dropped,
            "Task notification broadcast"
        );
        report
    }
}
