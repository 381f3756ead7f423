//! Dual-channel dispatch of task assignments.
//!
//! One dispatch runs `Started -> BroadcastDone -> MailAttempted -> Completed`
//! exactly once: the event is pushed to live subscribers, then the mail is
//! composed and handed to the transport. Neither channel can fail the other,
//! and neither can fail the dispatch as a whole; mail problems are folded
//! into the returned [`DispatchOutcome`].

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::broadcaster::RealtimeBroadcaster;
use super::events::{NotificationEvent, TaskAssignment};
use super::mail::{MailComposer, MailEnvelope, MailTransport, TransportError};

/// Dispatch progress, used for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStage {
    Started,
    BroadcastDone,
    MailAttempted,
    Completed,
}

impl fmt::Display for DispatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::BroadcastDone => write!(f, "broadcast_done"),
            Self::MailAttempted => write!(f, "mail_attempted"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Why the mail channel did not deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MailErrorKind {
    /// Bad sender or recipient address; a deployment defect.
    Composition,
    /// The relay could not be reached or refused the message.
    Transport,
}

/// Result of one dispatch, returned to the caller.
///
/// `mail_sent` and `mail_error` are mutually exclusive. `mail_sent == false`
/// with no `mail_error` means the transport was never attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub broadcast_attempted: bool,
    pub mail_sent: bool,
    pub mail_error: Option<String>,
    pub mail_error_kind: Option<MailErrorKind>,
}

impl DispatchOutcome {
    fn started() -> Self {
        Self {
            broadcast_attempted: false,
            mail_sent: false,
            mail_error: None,
            mail_error_kind: None,
        }
    }

    fn mail_failed(&mut self, kind: MailErrorKind, error: impl fmt::Display) {
        self.mail_sent = false;
        self.mail_error = Some(error.to_string());
        self.mail_error_kind = Some(kind);
    }
}

/// Orchestrates the realtime and mail channels for one assignment at a time.
///
/// Holds no per-dispatch state, so one instance serves any number of
/// concurrent dispatches.
pub struct Dispatcher {
    broadcaster: RealtimeBroadcaster,
    composer: MailComposer,
    transport: Arc<dyn MailTransport>,
}

impl Dispatcher {
    pub fn new(
        broadcaster: RealtimeBroadcaster,
        composer: MailComposer,
        transport: Arc<dyn MailTransport>,
    ) -> Self {
        Self {
            broadcaster,
            composer,
            transport,
        }
    }

    pub fn broadcaster(&self) -> &RealtimeBroadcaster {
        &self.broadcaster
    }

    /// Run one dispatch to completion.
    pub async fn dispatch(&self, assignment: TaskAssignment) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::started();
        let assignee = assignment.assignee_email().to_string();
        debug!(assignee = %assignee, stage = %DispatchStage::Started, "Dispatching task notification");

        let event = NotificationEvent::from(&assignment);
        let report = self.broadcaster.broadcast(&event);
        outcome.broadcast_attempted = true;
        debug!(
            assignee = %assignee,
            stage = %DispatchStage::BroadcastDone,
            delivered = report.delivered,
            recipients = report.recipients,
            "Realtime channel done"
        );

        match self.composer.compose(&assignment) {
            Ok(envelope) => match self.send_detached(envelope).await {
                Ok(()) => {
                    outcome.mail_sent = true;
                    info!(assignee = %assignee, transport = self.transport.name(), "Assignment mail sent");
                }
                Err(e) => {
                    warn!(assignee = %assignee, transport = self.transport.name(), error = %e, "Failed to send assignment mail");
                    outcome.mail_failed(MailErrorKind::Transport, e);
                }
            },
            Err(e) => {
                error!(assignee = %assignee, error = %e, "Cannot compose assignment mail; check MAIL_FROM / EMAIL_USER");
                outcome.mail_failed(MailErrorKind::Composition, e);
            }
        }
        debug!(assignee = %assignee, stage = %DispatchStage::MailAttempted, mail_sent = outcome.mail_sent, "Mail channel done");

        debug!(assignee = %assignee, stage = %DispatchStage::Completed, "Dispatch finished");
        outcome
    }

    /// Run the transport on its own task.
    ///
    /// If the caller's future is dropped mid-send, the task keeps running
    /// until the relay session finishes and is closed.
    async fn send_detached(&self, envelope: MailEnvelope) -> Result<(), TransportError> {
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move { transport.send(envelope).await })
            .await
            .map_err(|e| TransportError::Aborted(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::config::{DEFAULT_MAIL_BODY, DEFAULT_MAIL_SUBJECT};
    use crate::notification::registry::{ConnectionRegistry, Subscriber, SubscriberId};

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<MailEnvelope>>,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, envelope: MailEnvelope) -> Result<(), TransportError> {
            self.sent.lock().push(envelope);
            Ok(())
        }
    }

    struct FailingTransport {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl MailTransport for FailingTransport {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn send(&self, _envelope: MailEnvelope) -> Result<(), TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Aborted("connection refused".to_string()))
        }
    }

    struct SlowTransport {
        finished: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MailTransport for SlowTransport {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn send(&self, _envelope: MailEnvelope) -> Result<(), TransportError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn dispatcher_with(
        registry: Arc<ConnectionRegistry>,
        transport: Arc<dyn MailTransport>,
    ) -> Dispatcher {
        Dispatcher::new(
            RealtimeBroadcaster::new(registry),
            MailComposer::new("taskbot@example.com", DEFAULT_MAIL_SUBJECT, DEFAULT_MAIL_BODY),
            transport,
        )
    }

    fn alice() -> TaskAssignment {
        TaskAssignment::new("Alice", "alice@example.com", "Write report").unwrap()
    }

    #[tokio::test]
    async fn test_healthy_relay_with_two_subscribers() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (a, mut rx_a) = Subscriber::channel(SubscriberId::generate(), 4);
        let (b, mut rx_b) = Subscriber::channel(SubscriberId::generate(), 4);
        registry.add(a);
        registry.add(b);
        let transport = Arc::new(RecordingTransport::default());

        let outcome = dispatcher_with(registry, transport.clone())
            .dispatch(alice())
            .await;

        assert_eq!(
            outcome,
            DispatchOutcome {
                broadcast_attempted: true,
                mail_sent: true,
                mail_error: None,
                mail_error_kind: None,
            }
        );
        assert!(outcome.broadcast_attempted && outcome.mail_sent);
        for rx in [&mut rx_a, &mut rx_b] {
            let frame: serde_json::Value =
                serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
            assert_eq!(
                frame["data"],
                serde_json::json!({"name": "Alice", "email": "alice@example.com", "task": "Write report"})
            );
        }

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to.to_string(), "alice@example.com");
        assert_eq!(sent[0].subject, "New Task Assigned");
    }

    #[tokio::test]
    async fn test_transport_failure_is_absorbed() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (a, mut rx_a) = Subscriber::channel(SubscriberId::generate(), 4);
        registry.add(a);
        let transport = Arc::new(FailingTransport {
            attempts: AtomicUsize::new(0),
        });

        let outcome = dispatcher_with(registry, transport.clone())
            .dispatch(alice())
            .await;

        assert!(outcome.broadcast_attempted);
        assert!(!outcome.mail_sent);
        assert_eq!(outcome.mail_error_kind, Some(MailErrorKind::Transport));
        assert!(outcome.mail_error.unwrap().contains("connection refused"));
        assert!(rx_a.recv().await.is_some());
        // Single attempt, no retry.
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_composition_failure_skips_transport() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = Dispatcher::new(
            RealtimeBroadcaster::new(Arc::new(ConnectionRegistry::new())),
            MailComposer::new("not a sender", DEFAULT_MAIL_SUBJECT, DEFAULT_MAIL_BODY),
            transport.clone(),
        );

        let outcome = dispatcher.dispatch(alice()).await;

        assert!(outcome.broadcast_attempted);
        assert!(!outcome.mail_sent);
        assert_eq!(outcome.mail_error_kind, Some(MailErrorKind::Composition));
        assert!(transport.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_no_subscribers_mail_unaffected() {
        let transport = Arc::new(RecordingTransport::default());
        let outcome = dispatcher_with(Arc::new(ConnectionRegistry::new()), transport.clone())
            .dispatch(alice())
            .await;

        assert!(outcome.broadcast_attempted);
        assert!(outcome.mail_sent);
        assert_eq!(transport.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_dispatch_still_finishes_send() {
        let finished = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(dispatcher_with(
            Arc::new(ConnectionRegistry::new()),
            Arc::new(SlowTransport {
                finished: Arc::clone(&finished),
            }),
        ));

        let task = {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move { dispatcher.dispatch(alice()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        task.abort();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_dispatches_do_not_queue_behind_slow_relay() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (a, mut rx_a) = Subscriber::channel(SubscriberId::generate(), 8);
        let (b, mut rx_b) = Subscriber::channel(SubscriberId::generate(), 8);
        registry.add(a);
        registry.add(b);
        let finished = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(dispatcher_with(
            registry,
            Arc::new(SlowTransport {
                finished: Arc::clone(&finished),
            }),
        ));

        let started = std::time::Instant::now();
        let outcomes = tokio::join!(
            dispatcher.dispatch(alice()),
            dispatcher.dispatch(alice()),
            dispatcher.dispatch(alice()),
            dispatcher.dispatch(alice()),
        );
        let elapsed = started.elapsed();

        // Four sequential sends would take at least 200ms.
        assert!(elapsed < Duration::from_millis(150), "took {elapsed:?}");
        for outcome in [outcomes.0, outcomes.1, outcomes.2, outcomes.3] {
            assert!(outcome.broadcast_attempted);
            assert!(outcome.mail_sent);
        }
        assert_eq!(finished.load(Ordering::SeqCst), 4);

        for rx in [&mut rx_a, &mut rx_b] {
            let mut frames = 0;
            while rx.try_recv().is_ok() {
                frames += 1;
            }
            assert_eq!(frames, 4);
        }
    }

    #[tokio::test]
    async fn test_mail_fields_mutually_exclusive() {
        let registry = Arc::new(ConnectionRegistry::new());
        let ok = dispatcher_with(Arc::clone(&registry), Arc::new(RecordingTransport::default()))
            .dispatch(alice())
            .await;
        let failed = dispatcher_with(
            registry,
            Arc::new(FailingTransport {
                attempts: AtomicUsize::new(0),
            }),
        )
        .dispatch(alice())
        .await;

        for outcome in [ok, failed] {
            assert!(outcome.broadcast_attempted);
            assert_ne!(outcome.mail_sent, outcome.mail_error.is_some());
        }
    }

    #[test]
    fn test_outcome_serialization() {
        let mut outcome = DispatchOutcome::started();
        outcome.broadcast_attempted = true;
        outcome.mail_failed(MailErrorKind::Transport, "relay down");

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["broadcast_attempted"], true);
        assert_eq!(json["mail_sent"], false);
        assert_eq!(json["mail_error"], "relay down");
        assert_eq!(json["mail_error_kind"], "transport");
    }
}
