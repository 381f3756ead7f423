//! Task assignment notifications.
//!
//! Every assignment is delivered over two independent channels:
//!
//! - a realtime broadcast to every live subscriber in the
//!   [`ConnectionRegistry`], and
//! - a best-effort email to the assignee through a [`MailTransport`].
//!
//! The [`Dispatcher`] drives both and reports a [`DispatchOutcome`]. A failing
//! channel never blocks or fails the other one.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use task_notify::config::MailConfig;
//! use task_notify::notification::{
//!     ConnectionRegistry, Dispatcher, MailComposer, RealtimeBroadcaster, SmtpMailTransport,
//!     TaskAssignment,
//! };
//!
//! let mail = MailConfig::default();
//! let registry = Arc::new(ConnectionRegistry::new());
//! let dispatcher = Dispatcher::new(
//!     RealtimeBroadcaster::new(registry),
//!     MailComposer::from_config(&mail),
//!     Arc::new(SmtpMailTransport::new(&mail)?),
//! );
//!
//! let assignment = TaskAssignment::new("Alice", "alice@example.com", "Write report")?;
//! let outcome = dispatcher.dispatch(assignment).await;
//! ```

pub mod broadcaster;
pub mod dispatcher;
pub mod events;
pub mod mail;
pub mod registry;

pub use broadcaster::{BroadcastReport, RealtimeBroadcaster};
pub use dispatcher::{DispatchOutcome, DispatchStage, Dispatcher, MailErrorKind};
pub use events::{NotificationEvent, SocketFrame, TASK_NOTIFICATION_EVENT, TaskAssignment};
pub use mail::{
    CompositionError, MailComposer, MailEnvelope, MailTransport, SmtpMailTransport, TransportError,
};
pub use registry::{ConnectionRegistry, DeliveryError, Subscriber, SubscriberId};
